//! Model-output parsers.

use crate::types::ParserEvent;

/// Turns raw model text into [`ParserEvent`]s.
///
/// Implementations recognize the trigger signal and `<invoke>` markup that
/// the injected prompt asks the model to produce. `finish` flushes any
/// held-back text and must end with [`ParserEvent::End`].
pub trait InvokeParser: Send {
    fn feed(&mut self, text: &str) -> Vec<ParserEvent>;

    fn finish(&mut self) -> Vec<ParserEvent>;
}

/// Parser for requests without tools: every fragment is text.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextParser;

impl InvokeParser for PlainTextParser {
    fn feed(&mut self, text: &str) -> Vec<ParserEvent> {
        if text.is_empty() {
            return Vec::new();
        }
        vec![ParserEvent::text(text)]
    }

    fn finish(&mut self) -> Vec<ParserEvent> {
        vec![ParserEvent::End]
    }
}

impl<P: InvokeParser + ?Sized> InvokeParser for Box<P> {
    fn feed(&mut self, text: &str) -> Vec<ParserEvent> {
        (**self).feed(text)
    }

    fn finish(&mut self) -> Vec<ParserEvent> {
        (**self).finish()
    }
}
