//! Advertisement studio: the compact five-agent production crew

use super::{DomainPack, Welcome};
use crate::lookup::StaticTable;
use crate::roster::{AgentRecord, Roster};
use crate::types::Team;

pub const NAME: &str = "studio";

const WELCOME: &str =
    "Hello! I'm your marketing team. What kind of advertisement would you like us to create today?";

fn agents() -> Vec<AgentRecord> {
    vec![
        AgentRecord::new("strategist", "Campaign Strategist", Team::Research)
            .with_role("Recommender")
            .with_description("Finds the value propositions worth leading with")
            .locked(),
        AgentRecord::new("writer", "Copywriter", Team::Creative)
            .with_role("Writer")
            .with_description("Writes the advertisement copy"),
        AgentRecord::new("illustrator", "Illustrator", Team::Creative)
            .with_role("Illustrator")
            .with_description("Produces visuals for the campaign"),
        AgentRecord::new("audio", "Sound Designer", Team::Creative)
            .with_role("Audio")
            .with_description("Scores the soundtrack"),
        AgentRecord::new("movie", "Video Producer", Team::Creative)
            .with_role("Animator")
            .with_description("Cuts all assets into the final video"),
    ]
}

pub fn pack() -> DomainPack {
    let lookup = StaticTable::new("I'm here to help with your marketing needs.")
        .with(
            "writer",
            "I'll craft compelling copy for this advertisement that resonates with your target audience.",
        )
        .with(
            "illustrator",
            "I'll generate visuals that align with the marketing message and brand aesthetic.",
        )
        .with(
            "audio",
            "I can create a soundtrack that enhances the emotional impact of your advertisement.",
        )
        .with(
            "movie",
            "I'll compile all assets into a cohesive video advertisement optimized for engagement.",
        )
        .with(
            "strategist",
            "Based on market analysis, I recommend focusing on these key value propositions in your campaign.",
        );

    DomainPack {
        name: NAME.to_string(),
        welcome: Some(Welcome::system("Marketing Team", "M", WELCOME)),
        roster: Roster::builtin(agents()),
        lookup,
    }
}
