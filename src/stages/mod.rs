pub mod ingestion;
pub mod trainer;
pub mod validation;

pub use ingestion::DataIngestion;
pub use trainer::ModelTrainer;
pub use validation::DataValidation;
