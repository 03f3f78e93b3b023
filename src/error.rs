use std::io;
use std::path::PathBuf;
use wasm_bindgen::JsValue;

/// Failure while decoding GPX text.
#[derive(Debug)]
pub enum ParseError {
    XmlParse(quick_xml::Error),
    MissingRoot,
    ContentAfterRoot,
    UnexpectedEof {
        element: &'static str,
    },
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },
    InvalidElement {
        element: &'static str,
        value: String,
    },
    InvalidTimestamp {
        value: String,
        source: chrono::ParseError,
    },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::XmlParse(e) => write!(f, "XML parse error: {e}"),
            Self::MissingRoot => write!(f, "Document has no <gpx> root element"),
            Self::ContentAfterRoot => write!(f, "Content after the closing </gpx> tag"),
            Self::UnexpectedEof { element } => {
                write!(f, "Unexpected end of document inside <{element}>")
            }
            Self::MissingAttribute { element, attribute } => {
                write!(f, "Missing attribute '{attribute}' on <{element}>")
            }
            Self::InvalidAttribute {
                element,
                attribute,
                value,
            } => write!(
                f,
                "Invalid value '{value}' for attribute '{attribute}' on <{element}>"
            ),
            Self::InvalidElement { element, value } => {
                write!(f, "Invalid content '{value}' in <{element}>")
            }
            Self::InvalidTimestamp { value, source } => {
                write!(f, "Invalid timestamp '{value}': {source}")
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::XmlParse(e) => Some(e),
            Self::InvalidTimestamp { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<quick_xml::Error> for ParseError {
    fn from(e: quick_xml::Error) -> Self {
        Self::XmlParse(e)
    }
}

/// Failure while loading a track table.
#[derive(Debug)]
pub enum TrackError {
    /// The GPX file could not be opened or read.
    FileAccess { path: PathBuf, source: io::Error },
    /// The file was read but is not well-formed GPX.
    Parse(ParseError),
}

impl std::fmt::Display for TrackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileAccess { path, source } => {
                write!(f, "Cannot read '{}': {source}", path.display())
            }
            Self::Parse(e) => write!(f, "GPX parse error: {e}"),
        }
    }
}

impl std::error::Error for TrackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FileAccess { source, .. } => Some(source),
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<ParseError> for TrackError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

impl From<ParseError> for JsValue {
    fn from(e: ParseError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}

impl From<TrackError> for JsValue {
    fn from(e: TrackError) -> Self {
        JsValue::from_str(&e.to_string())
    }
}
