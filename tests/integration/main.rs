//! Integration tests for the council pipeline.

mod council_flow;
mod mock_collaborators;
