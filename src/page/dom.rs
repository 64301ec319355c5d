use std::sync::{Arc, Mutex};

/// One embed-capable element currently attached to a document.
pub trait EmbedElement: Send {
    /// The element's source attribute, if it has one.
    fn source(&self) -> Option<String>;
    /// Detaches the element from the document. Detaching twice is a no-op.
    fn detach(&self);
}

/// Narrow contract over the host page's DOM: enumerate embeds and report the
/// document hostname. Subtree-insertion notifications arrive through
/// [`PageHandle::nodes_added`](crate::page::PageHandle::nodes_added), driven
/// by whatever owns the real observer.
pub trait PageDocument: Send + Sync {
    /// Hostname of the document origin, as it appears in the document URL.
    fn hostname(&self) -> String;
    /// All embed-capable elements currently in the document.
    fn embeds(&self) -> Vec<Box<dyn EmbedElement>>;
}

#[derive(Debug)]
struct Frame {
    src: Option<String>,
    attached: bool,
}

/// In-memory document used by the tests and for embedding the filter without
/// a browser. Frames are inserted by the test script; detached frames stay in
/// the backing list so handles remain valid, they just stop being enumerated.
#[derive(Clone)]
pub struct ScriptedDocument {
    hostname: String,
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl ScriptedDocument {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            frames: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn insert_embed(&self, src: &str) {
        self.frames.lock().unwrap().push(Frame {
            src: Some(src.to_string()),
            attached: true,
        });
    }

    /// An embed with no source attribute, e.g. a script-populated frame.
    pub fn insert_sourceless_embed(&self) {
        self.frames.lock().unwrap().push(Frame {
            src: None,
            attached: true,
        });
    }

    pub fn attached_count(&self) -> usize {
        self.frames.lock().unwrap().iter().filter(|f| f.attached).count()
    }
}

impl PageDocument for ScriptedDocument {
    fn hostname(&self) -> String {
        self.hostname.clone()
    }

    fn embeds(&self) -> Vec<Box<dyn EmbedElement>> {
        let frames = self.frames.lock().unwrap();
        frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.attached)
            .map(|(index, _)| {
                Box::new(ScriptedEmbed {
                    index,
                    frames: self.frames.clone(),
                }) as Box<dyn EmbedElement>
            })
            .collect()
    }
}

struct ScriptedEmbed {
    index: usize,
    frames: Arc<Mutex<Vec<Frame>>>,
}

impl EmbedElement for ScriptedEmbed {
    fn source(&self) -> Option<String> {
        self.frames.lock().unwrap()[self.index].src.clone()
    }

    fn detach(&self) {
        self.frames.lock().unwrap()[self.index].attached = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_frames_stop_enumerating() {
        let doc = ScriptedDocument::new("www.example.com");
        doc.insert_embed("https://embed.twitch.tv/?channel=a");
        doc.insert_embed("https://example.com/player");
        assert_eq!(doc.attached_count(), 2);

        let embeds = doc.embeds();
        embeds[0].detach();
        assert_eq!(doc.attached_count(), 1);
        assert_eq!(doc.embeds().len(), 1);
        assert_eq!(
            doc.embeds()[0].source().as_deref(),
            Some("https://example.com/player")
        );
    }
}
