pub mod db;
pub mod groq_llm;
pub mod storage;

pub use db::DbAdapter;
pub use groq_llm::GroqCompletionAdapter;
pub use storage::LocalFileStorage;
