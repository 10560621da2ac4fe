//! Tests for building and evaluating dynamical systems.
//!
//! These cover graph resolution, the evaluation of derivatives and the
//! bookkeeping exposed to solvers.
