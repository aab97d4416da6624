use thiserror::Error;

#[derive(Error, Debug)]
pub enum KmlError {
    #[error("XML write failed: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
