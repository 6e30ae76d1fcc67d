// CSV ingestion: decoding, parsing and column type inference for the cost tables.

mod csv_loader;
mod csv_parser;

pub use csv_loader::CsvLoader;
