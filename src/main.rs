//! scripture-cache: reading-session simulator.
//!
//! Drives the content cache the way the reading UI does: look up a chapter,
//! and on a miss fetch it from the (synthetic) scripture source and cache it.
//! Prints cache statistics as JSON when the run completes.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing::info;

use scripture_cache::config::{Cli, Config};
use scripture_cache::content::{
    book_key, chapter_key, passage_key, Book, Chapter, Verse, VersePassage,
};
use scripture_cache::{CacheManager, CacheRegistry, Tier};

const BOOKS: &[(&str, u32)] = &[
    ("GEN", 50),
    ("EXO", 40),
    ("PSA", 150),
    ("PRO", 31),
    ("ISA", 66),
    ("MAT", 28),
    ("JHN", 21),
    ("ROM", 16),
];

const TRANSLATION: &str = "KJV";

/// Stand-in for the scripture source consulted on a miss.
fn fetch_chapter(book: &str, number: u32) -> Chapter {
    let verses = (1..=20 + number % 17)
        .map(|n| Verse {
            number: n,
            text: format!("{book} {number}:{n} synthetic verse text for cache sizing"),
        })
        .collect();
    Chapter {
        book: book.to_string(),
        number,
        translation: TRANSLATION.to_string(),
        verses,
    }
}

async fn read_session(cache: Arc<CacheManager>, session: usize, reads: usize) -> (usize, usize) {
    let mut hits = 0;
    let mut misses = 0;

    for i in 0..reads {
        // Readers revisit a handful of books far more often than the rest.
        let idx = if i % 3 == 0 {
            (session + i) % BOOKS.len()
        } else {
            (session + i) % 3
        };
        let (book, chapters) = BOOKS[idx];
        let number = 1 + ((i * 7 + session * 13) as u32 % chapters);
        let key = chapter_key(book, number, TRANSLATION);

        if cache.get(Tier::Chapter, &key).await.is_some() {
            hits += 1;
            continue;
        }
        misses += 1;

        let chapter = fetch_chapter(book, number);
        if i % 5 == 0 {
            let passage = VersePassage {
                book: book.to_string(),
                chapter: number,
                translation: TRANSLATION.to_string(),
                verses: chapter.verses.iter().take(3).cloned().collect(),
            };
            cache
                .put(Tier::Passage, passage_key(book, number, 1..=3, TRANSLATION), passage)
                .await;
        }
        if i % 50 == 0 {
            let whole = Book {
                name: book.to_string(),
                translation: TRANSLATION.to_string(),
                chapters: (1..=chapters.min(5)).map(|c| fetch_chapter(book, c)).collect(),
            };
            cache.put(Tier::Book, book_key(book, TRANSLATION), whole).await;
        }
        cache.put(Tier::Chapter, key, chapter).await;
    }

    (hits, misses)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments.
    let cli = Cli::parse();

    // Initialize tracing/logging.
    let filter = if cli.verbose {
        "scripture_cache=debug"
    } else {
        "scripture_cache=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_target(true)
        .init();

    info!("scripture-cache v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration.
    let config = Config::load(&cli.config)?;
    info!(
        max_entries = config.capacity.max_entries,
        memory_ceiling_mb = config.memory_ceiling_mb(),
        threshold = config.pressure.low_memory_threshold,
        "Configuration loaded"
    );

    let registry = CacheRegistry::new(config)?;
    let cache = registry.get_instance();

    let started = Instant::now();
    let sessions: Vec<_> = (0..cli.sessions)
        .map(|s| tokio::spawn(read_session(cache.clone(), s, cli.reads)))
        .collect();

    let mut hits = 0;
    let mut misses = 0;
    for session in sessions {
        let (h, m) = session.await?;
        hits += h;
        misses += m;
    }

    info!(
        sessions = cli.sessions,
        reads = cli.reads,
        hits,
        misses,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Simulation complete"
    );

    let pressure = cache.check_pressure().await;
    info!(state = %pressure.state, evicted = pressure.evicted, "Final pressure check");

    println!("{}", serde_json::to_string_pretty(&cache.stats().await)?);
    if cli.metrics {
        print!("{}", registry.metrics().render());
    }

    registry.destroy().await;
    Ok(())
}
