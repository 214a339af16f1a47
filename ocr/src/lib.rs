//! Colaborador de OCR: el trait que usa el server, el motor por línea de
//! comandos (tesseract + pdftoppm) y el dispatcher con concurrencia acotada.

pub mod dispatcher;
pub mod engine;
pub mod tesseract;

pub use dispatcher::OcrDispatcher;
pub use engine::{OcrEngine, OcrError};
pub use tesseract::{TesseractConfig, TesseractEngine};
