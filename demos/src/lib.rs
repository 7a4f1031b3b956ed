//! Runnable examples for `hlsv` live under `examples/`.
