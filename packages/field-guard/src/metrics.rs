use metrics::{describe_counter, describe_histogram, Unit};

// See https://prometheus.io/docs/practices/naming/
pub const ENCRYPTED_VALUES_TOTAL: &str = "field_guard_encrypted_values_total";
pub const ENCRYPTION_ERROR_TOTAL: &str = "field_guard_encryption_error_total";
pub const ENCRYPTION_DURATION_SECONDS: &str = "field_guard_encryption_duration_seconds";
pub const RESTORED_VALUES_TOTAL: &str = "field_guard_restored_values_total";

pub const DECRYPTED_VALUES_TOTAL: &str = "field_guard_decrypted_values_total";
pub const DECRYPTION_ERROR_TOTAL: &str = "field_guard_decryption_error_total";
pub const DECRYPTION_DURATION_SECONDS: &str = "field_guard_decryption_duration_seconds";

pub const STATEMENTS_TOTAL: &str = "field_guard_statements_total";
pub const STATEMENTS_UNMAPPABLE_TOTAL: &str = "field_guard_statements_unmappable_total";
pub const STATEMENT_CACHE_HITS_TOTAL: &str = "field_guard_statement_cache_hits_total";

pub const SCOPE_REWRITES_TOTAL: &str = "field_guard_scope_rewrites_total";
pub const SCOPE_ERROR_TOTAL: &str = "field_guard_scope_error_total";

///
/// Registers descriptions for every metric.
///
/// Installing a recorder is left to the host. Call this after the recorder is installed.
///
pub fn describe() {
    describe_counter!(ENCRYPTED_VALUES_TOTAL, "Number of encrypted parameter values");
    describe_counter!(ENCRYPTION_ERROR_TOTAL, "Number of encryption errors");
    describe_histogram!(
        ENCRYPTION_DURATION_SECONDS,
        Unit::Seconds,
        "Duration of parameter encryption for one statement"
    );
    describe_counter!(
        RESTORED_VALUES_TOTAL,
        "Number of parameter values restored to plaintext"
    );

    describe_counter!(DECRYPTED_VALUES_TOTAL, "Number of decrypted values");
    describe_counter!(DECRYPTION_ERROR_TOTAL, "Number of decryption errors");
    describe_histogram!(
        DECRYPTION_DURATION_SECONDS,
        Unit::Seconds,
        "Duration of result decryption for one batch of rows"
    );

    describe_counter!(STATEMENTS_TOTAL, "Total number of analyzed SQL statements");
    describe_counter!(
        STATEMENTS_UNMAPPABLE_TOTAL,
        "Number of statements with placeholders that could not be attributed to a column"
    );
    describe_counter!(
        STATEMENT_CACHE_HITS_TOTAL,
        "Number of statement analyses served from the cache"
    );

    describe_counter!(SCOPE_REWRITES_TOTAL, "Number of statements rewritten with a data scope");
    describe_counter!(SCOPE_ERROR_TOTAL, "Number of data scope rewrites that failed");
}
