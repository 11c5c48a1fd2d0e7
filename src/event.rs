use crate::{Anchor, Mark};

/// Receives the structure of each document as the parser recognizes it.
///
/// A document is reported as `document_start`, exactly one root node, then
/// `document_end`. A node is a `null`, `alias` or `scalar` call, or a
/// `sequence_start`/`map_start` call followed by the nested nodes and the
/// matching end call. Mapping entries are reported as the key node followed by
/// the value node.
///
/// Tags are passed fully expanded. `"?"` marks a node without a tag and `"!"`
/// a quoted scalar without a tag.
pub trait EventHandler {
    fn document_start(&mut self, mark: Mark);
    fn document_end(&mut self);

    fn null(&mut self, mark: Mark, tag: &str, anchor: Anchor);
    fn alias(&mut self, mark: Mark, anchor: Anchor);
    fn scalar(&mut self, mark: Mark, tag: &str, anchor: Anchor, value: &str);

    fn sequence_start(&mut self, mark: Mark, tag: &str, anchor: Anchor);
    fn sequence_end(&mut self);

    fn map_start(&mut self, mark: Mark, tag: &str, anchor: Anchor);
    fn map_end(&mut self);
}

/// The event structure.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub struct Event {
    /// The event data.
    pub data: EventData,
    /// The beginning of the event, or [`Mark::NULL`] for end events.
    pub mark: Mark,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventData {
    DocumentStart,
    DocumentEnd,
    Null {
        tag: String,
        anchor: Anchor,
    },
    Alias {
        anchor: Anchor,
    },
    Scalar {
        tag: String,
        anchor: Anchor,
        value: String,
    },
    SequenceStart {
        tag: String,
        anchor: Anchor,
    },
    SequenceEnd,
    MapStart {
        tag: String,
        anchor: Anchor,
    },
    MapEnd,
}

impl Event {
    pub fn new(data: EventData, mark: Mark) -> Event {
        Event { data, mark }
    }

    /// Create an event without a position.
    pub fn unmarked(data: EventData) -> Event {
        Event::new(data, Mark::NULL)
    }
}

/// Records every event in order.
impl EventHandler for Vec<Event> {
    fn document_start(&mut self, mark: Mark) {
        self.push(Event::new(EventData::DocumentStart, mark));
    }

    fn document_end(&mut self) {
        self.push(Event::unmarked(EventData::DocumentEnd));
    }

    fn null(&mut self, mark: Mark, tag: &str, anchor: Anchor) {
        let tag = tag.to_owned();
        self.push(Event::new(EventData::Null { tag, anchor }, mark));
    }

    fn alias(&mut self, mark: Mark, anchor: Anchor) {
        self.push(Event::new(EventData::Alias { anchor }, mark));
    }

    fn scalar(&mut self, mark: Mark, tag: &str, anchor: Anchor, value: &str) {
        self.push(Event::new(
            EventData::Scalar {
                tag: tag.to_owned(),
                anchor,
                value: value.to_owned(),
            },
            mark,
        ));
    }

    fn sequence_start(&mut self, mark: Mark, tag: &str, anchor: Anchor) {
        let tag = tag.to_owned();
        self.push(Event::new(EventData::SequenceStart { tag, anchor }, mark));
    }

    fn sequence_end(&mut self) {
        self.push(Event::unmarked(EventData::SequenceEnd));
    }

    fn map_start(&mut self, mark: Mark, tag: &str, anchor: Anchor) {
        let tag = tag.to_owned();
        self.push(Event::new(EventData::MapStart { tag, anchor }, mark));
    }

    fn map_end(&mut self) {
        self.push(Event::unmarked(EventData::MapEnd));
    }
}
