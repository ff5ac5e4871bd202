pub mod acquisition;
pub mod matching;
pub mod playlist;
pub mod spotify;
