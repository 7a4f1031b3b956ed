//! Integration tests for `hlsv` live under `tests/`.
