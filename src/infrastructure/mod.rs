pub mod db;
pub mod ffmpeg;
