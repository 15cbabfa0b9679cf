pub mod converter;
pub mod negotiator;
pub mod wav_format;
