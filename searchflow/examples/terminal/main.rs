//! Type repository names, one line per keystroke, and watch the results.
//!
//! ```sh
//! RUST_LOG=info cargo run --example terminal
//! ```
//!
//! Each line read from stdin replaces the text field, so typing `r`, `rx`,
//! `rxs` in quick succession searches for `rxs` only.  Ctrl-D ends the run
//! once the last search has settled, so `echo rust | cargo run --example
//! terminal` prints one result.

use std::io::BufRead;
use std::thread;

use searchflow::*;

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = SearchConfig::from_env()?;
    let search = GithubSearch::new(&config)?;
    let (handle, keystrokes) = text_input("");

    let typist = thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if handle.set_text(line.trim()).is_err() {
                return;
            }
        }
        let _ = handle.close();
    });

    let pipeline = SearchPipeline::bind(
        keystrokes,
        search,
        |text: String| print!("{text}"),
        |text: String| println!("{text}"),
        &config,
    );
    pipeline.run(RunMode::RealTime, RunFor::Forever)?;
    typist
        .join()
        .map_err(|_| anyhow::anyhow!("stdin reader panicked"))?;
    Ok(())
}
