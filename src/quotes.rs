use serde::Serialize;

use crate::db::{
    keys,
    store::{self, SharedStore},
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Quote {
    pub text: &'static str,
    pub author: &'static str,
}

const QUOTES: &[Quote] = &[
    Quote {
        text: "Discipline beats motivation.",
        author: "Unknown",
    },
    Quote {
        text: "Small daily wins become momentum.",
        author: "Unknown",
    },
    Quote {
        text: "You don't need more time; you need more focus.",
        author: "Unknown",
    },
    Quote {
        text: "Simplicity is the ultimate sophistication.",
        author: "Leonardo da Vinci",
    },
    Quote {
        text: "It always seems impossible until it\u{2019}s done.",
        author: "Nelson Mandela",
    },
];

/// Rotating focus quotes. The stored counter only grows; the shown quote is
/// the counter modulo the deck size.
pub struct QuoteDeck {
    store: SharedStore,
    counter: usize,
}

impl QuoteDeck {
    pub fn new(store: SharedStore) -> Self {
        let counter = store::load(&*store, keys::QUOTE).unwrap_or(0);
        Self { store, counter }
    }

    pub fn current(&self) -> Quote {
        QUOTES[self.counter % QUOTES.len()]
    }

    pub fn next(&mut self) -> Quote {
        self.counter = self.counter.wrapping_add(1);
        store::save(&*self.store, keys::QUOTE, &self.counter);
        self.current()
    }
}

impl std::fmt::Display for Quote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\" - {}", self.text, self.author)
    }
}
