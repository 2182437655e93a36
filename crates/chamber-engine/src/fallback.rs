// SPDX-FileCopyrightText: 2026 Rhythm Chamber Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Replies produced without a language model.
//!
//! When a turn errors out past the point of recovery, the engine still owes
//! the listener an answer. These generators build one from the imported
//! listening data alone, then tell the listener how to bring the configured
//! backend back. The output is deterministic for a given profile and never
//! empty.

use chamber_core::{ListenerProfile, ProviderKind};

/// Assistant reply for a turn that failed with an unrecoverable error.
///
/// Leads with whatever the listening data can still say (top artist, total
/// hours, artists gone quiet), then names the steps to get `kind` answering
/// again.
pub fn fallback_reply(profile: &ListenerProfile, kind: ProviderKind) -> String {
    let mut reply = String::from(
        "I couldn't reach a language model just now, so here is what your \
         listening data says on its own.",
    );
    let facts = profile_facts(profile);
    if facts.is_empty() {
        reply.push_str(" No listening history is imported yet, so there is nothing to summarize.");
    } else {
        reply.push(' ');
        reply.push_str(&facts.join(" "));
    }
    reply.push(' ');
    reply.push_str(configuration_steps(kind));
    reply
}

/// Canned reply for the cloud backend when no API key is configured.
///
/// The turn never reaches the network in that state; this is a normal
/// assistant message, not an error.
pub fn no_key_reply(model: &str) -> String {
    format!(
        "The cloud backend is selected but no API key is configured, so I can't \
         call {model}. Add `api_key` under `[providers.cloud]` in chamber.toml, \
         or switch `providers.active` to a local backend such as `ollama`, then \
         ask me again."
    )
}

/// Plain-prose facts drawn from the profile, one sentence each.
pub(crate) fn profile_facts(profile: &ListenerProfile) -> Vec<String> {
    let mut facts = Vec::new();
    if let Some(artist) = &profile.top_artist {
        facts.push(format!("Your most played artist is {artist}."));
    }
    if profile.total_hours > 0.0 {
        facts.push(format!(
            "You have {:.1} hours of listening on record.",
            profile.total_hours
        ));
    }
    if !profile.ghosted_artists.is_empty() {
        facts.push(format!(
            "You haven't played {} in a long while.",
            join_names(&profile.ghosted_artists)
        ));
    }
    facts
}

fn configuration_steps(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::Cloud => {
            "To get full answers again, add your API key under `[providers.cloud]` \
             in chamber.toml."
        }
        ProviderKind::Ollama => {
            "To get full answers again, make sure the Ollama daemon is running \
             (`ollama serve`) and the configured model is pulled."
        }
        ProviderKind::LmStudio => {
            "To get full answers again, start the LM Studio local server and load \
             the configured model."
        }
    }
}

fn join_names(names: &[String]) -> String {
    match names {
        [] => String::new(),
        [only] => only.clone(),
        [rest @ .., last] => format!("{} or {last}", rest.join(", ")),
    }
}
