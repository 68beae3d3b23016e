mod common;
mod import;
mod passes;
