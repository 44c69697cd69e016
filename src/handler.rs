//! Content handlers: consumers of one extracted entry's bytes.
//!
//! A handler is picked by the entry's extension through a static table of
//! [`ContentKind`]s. Kinds without a registered handler fall back to the text
//! handler, and the [`Resolution`] says so.

use log::debug;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Text,
    Code,
    Structured,
    Image,
    Document,
    Spreadsheet,
    Audio,
    Archive,
}

const EXTENSIONS: &[(&str, ContentKind)] = &[
    ("txt", ContentKind::Text),
    ("log", ContentKind::Text),
    ("md", ContentKind::Text),
    ("csv", ContentKind::Text),
    ("rs", ContentKind::Code),
    ("js", ContentKind::Code),
    ("ts", ContentKind::Code),
    ("py", ContentKind::Code),
    ("go", ContentKind::Code),
    ("c", ContentKind::Code),
    ("h", ContentKind::Code),
    ("cpp", ContentKind::Code),
    ("java", ContentKind::Code),
    ("sh", ContentKind::Code),
    ("html", ContentKind::Code),
    ("css", ContentKind::Code),
    ("json", ContentKind::Structured),
    ("yaml", ContentKind::Structured),
    ("yml", ContentKind::Structured),
    ("toml", ContentKind::Structured),
    ("xml", ContentKind::Structured),
    ("png", ContentKind::Image),
    ("jpg", ContentKind::Image),
    ("jpeg", ContentKind::Image),
    ("gif", ContentKind::Image),
    ("webp", ContentKind::Image),
    ("bmp", ContentKind::Image),
    ("pdf", ContentKind::Document),
    ("xlsx", ContentKind::Spreadsheet),
    ("xls", ContentKind::Spreadsheet),
    ("ods", ContentKind::Spreadsheet),
    ("mp3", ContentKind::Audio),
    ("wav", ContentKind::Audio),
    ("flac", ContentKind::Audio),
    ("ogg", ContentKind::Audio),
    ("zip", ContentKind::Archive),
    ("tar", ContentKind::Archive),
    ("gz", ContentKind::Archive),
    ("tgz", ContentKind::Archive),
];

impl ContentKind {
    pub const ALL: [ContentKind; 8] = [
        ContentKind::Text,
        ContentKind::Code,
        ContentKind::Structured,
        ContentKind::Image,
        ContentKind::Document,
        ContentKind::Spreadsheet,
        ContentKind::Audio,
        ContentKind::Archive,
    ];

    /// Look up an extension (without the dot, any case).
    pub fn from_extension(extension: &str) -> Option<Self> {
        EXTENSIONS
            .iter()
            .find(|(ext, _)| ext.eq_ignore_ascii_case(extension))
            .map(|&(_, kind)| kind)
    }

    /// Whether the content is meant to be read as characters.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            ContentKind::Text | ContentKind::Code | ContentKind::Structured
        )
    }
}

/// Consumes one entry's decompressed bytes.
pub trait ContentHandler: Send + Sync {
    fn name(&self) -> &str;

    /// Read `stream` to its end; returns the number of bytes consumed.
    fn handle(&self, stream: &mut dyn Read, extension: Option<&str>) -> Result<u64>;
}

/// Which handler will take an entry, and whether it was a fallback.
#[derive(Clone)]
pub struct Resolution {
    pub handler: Arc<dyn ContentHandler>,
    /// Kind derived from the extension, if the extension is known.
    pub kind: Option<ContentKind>,
    pub fallback_used: bool,
}

impl Resolution {
    pub fn handle(&self, stream: &mut dyn Read, extension: Option<&str>) -> Result<u64> {
        self.handler.handle(stream, extension)
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolution")
            .field("handler", &self.handler.name())
            .field("kind", &self.kind)
            .field("fallback_used", &self.fallback_used)
            .finish()
    }
}

/// Handlers registered at startup, keyed by content kind.
pub struct HandlerRegistry {
    handlers: HashMap<ContentKind, Arc<dyn ContentHandler>>,
    fallback: Arc<dyn ContentHandler>,
}

impl HandlerRegistry {
    /// `text` handles [`ContentKind::Text`] and anything unresolved.
    pub fn new(text: Arc<dyn ContentHandler>) -> Self {
        let mut handlers: HashMap<ContentKind, Arc<dyn ContentHandler>> = HashMap::new();
        handlers.insert(ContentKind::Text, text.clone());
        Self {
            handlers,
            fallback: text,
        }
    }

    pub fn register(&mut self, kind: ContentKind, handler: Arc<dyn ContentHandler>) -> &mut Self {
        self.handlers.insert(kind, handler);
        self
    }

    pub fn resolve(&self, extension: Option<&str>) -> Resolution {
        let kind = extension.and_then(ContentKind::from_extension);

        match kind.and_then(|k| self.handlers.get(&k)) {
            Some(handler) => Resolution {
                handler: handler.clone(),
                kind,
                fallback_used: false,
            },
            None => {
                debug!(
                    "no handler for extension {:?} ({:?}); using {}",
                    extension,
                    kind,
                    self.fallback.name()
                );
                Resolution {
                    handler: self.fallback.clone(),
                    kind,
                    fallback_used: true,
                }
            }
        }
    }
}

/// Copies the bytes verbatim into a writer.
pub struct CopyHandler<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> CopyHandler<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<W: Write + Send> ContentHandler for CopyHandler<W> {
    fn name(&self) -> &str {
        "copy"
    }

    fn handle(&self, stream: &mut dyn Read, _extension: Option<&str>) -> Result<u64> {
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let n = io::copy(stream, &mut *out)?;
        out.flush()?;
        Ok(n)
    }
}

/// Drains the bytes and writes a one-line summary instead of the content.
///
/// Used where raw binary would be unreadable, such as a terminal.
pub struct SummaryHandler<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> SummaryHandler<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl<W: Write + Send> ContentHandler for SummaryHandler<W> {
    fn name(&self) -> &str {
        "summary"
    }

    fn handle(&self, stream: &mut dyn Read, extension: Option<&str>) -> Result<u64> {
        let n = io::copy(stream, &mut io::sink())?;
        let mut out = self.out.lock().unwrap_or_else(|e| e.into_inner());
        writeln!(
            out,
            "[{} bytes of {} data not shown; use -d to save it]",
            n,
            extension.unwrap_or("binary")
        )?;
        Ok(n)
    }
}
