use super::*;
use crate::downloader::test_helpers::*;
use crate::types::OutcomeStatus;
use std::sync::Arc;

mod events;
