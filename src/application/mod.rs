pub mod use_cases;

pub use use_cases::metadata_enrichment::MetadataEnrichmentUseCase;
pub use use_cases::metadata_profiler::MetadataProfiler;
pub use use_cases::sql_guard::SqlGuard;
pub use use_cases::text_to_sql::TextToSqlUseCase;
