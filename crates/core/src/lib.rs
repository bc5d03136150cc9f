pub mod agent;
pub mod llm_client;
pub mod pipeline;
pub mod store;
pub mod stt;
pub mod tools;
pub mod tts;
pub mod turn;
pub mod worker;

#[cfg(test)]
mod testing;
