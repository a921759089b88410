//! Trace replay example
//!
//! Feeds a synthetic request trace into the predictor and prints how the
//! predictions track the observed output distribution.
//!
//! Run: cargo run --example trace_replay

use std::time::{Duration, Instant};

use tokencast::{ColdStrategy, OutputPredictor, PredictorConfig};

fn main() {
    println!("=== tokencast trace replay ===\n");

    // 1. Build a predictor over a one-minute window.
    println!("--- 1. Configuration ---");
    let config = PredictorConfig::new(1024, 1024, Duration::from_secs(60))
        .with_cold_strategy(ColdStrategy::Optimistic);
    println!("  max input tokens:  {}", config.max_input_tokens);
    println!("  max output tokens: {}", config.max_output_tokens);
    println!("  window:            {:?}", config.window);
    println!("  interval:          {:?}\n", config.interval);

    let predictor = OutputPredictor::from_config(config).expect("valid config");

    // 2. Cold predictions before any traffic.
    println!("--- 2. Cold predictions ---");
    for input in [32, 256, 2048] {
        println!("  predict({input:5}) = {}", predictor.predict(input));
    }
    println!();

    // 3. Replay a synthetic trace: chat-style requests produce short
    //    answers, summarization-style requests produce long ones.
    println!("--- 3. Replaying traces ---");
    let t0 = Instant::now();
    for step in 0..900u32 {
        let (input, output) = if step % 3 == 0 {
            (800 + step % 100, 400 + step % 200)
        } else {
            (40 + step % 20, 20 + step % 30)
        };
        predictor.add_trace_at(input, output, 1, t0);
    }
    println!("  replayed 900 completed requests");
    println!("  live history slices: {}\n", predictor.size());

    // 4. Warm predictions now follow the per-bucket distributions.
    println!("--- 4. Warm predictions ---");
    for input in [48, 850] {
        let mut samples = Vec::new();
        for _ in 0..5 {
            samples.push(predictor.predict(input));
        }
        println!("  predict({input:4}) samples: {samples:?}");
    }
    println!();

    // 5. Internal counters.
    println!("--- 5. Statistics ---");
    let snapshot = predictor.stats().snapshot();
    println!("  traces:           {}", snapshot.traces);
    println!("  observations:     {}", snapshot.observations);
    println!("  predictions:      {}", snapshot.predictions);
    println!("  cold predictions: {}", snapshot.cold_predictions);
    println!("  rotations:        {}", snapshot.rotations);
    println!("  cold rate:        {:.2}", predictor.stats().cold_rate());
}
