//! Integration tests for preface. The suites live in the `[[test]]` targets under this
//! directory: `core`, `analysis`, `transforms` and the revm-backed `e2e`.
