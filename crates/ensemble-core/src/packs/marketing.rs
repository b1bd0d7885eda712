//! Marketing creative studio: ten agents split across research and creative

use super::{DomainPack, Welcome};
use crate::lookup::StaticTable;
use crate::roster::{AgentRecord, Roster};
use crate::types::Team;

pub const NAME: &str = "marketing";

const WELCOME: &str =
    "Welcome to your marketing creative studio! I'm here with my team to help you develop compelling marketing campaigns. What kind of campaign are you looking to create today?";

const FALLBACK: &str =
    "I'm here to help with your marketing campaign. What specific aspects would you like assistance with?";

fn agents() -> Vec<AgentRecord> {
    let research = |id: &str, name: &str, avatar: &str, description: &str| {
        AgentRecord::new(id, name, Team::Research)
            .with_role("Researcher")
            .with_avatar(avatar)
            .with_description(description)
    };
    let creative = |id: &str, name: &str, role: &str, avatar: &str, description: &str| {
        AgentRecord::new(id, name, Team::Creative)
            .with_role(role)
            .with_avatar(avatar)
            .with_description(description)
    };

    vec![
        research(
            "industry",
            "Industry Analyst",
            "I",
            "Analyzes market trends and industry developments",
        ),
        research(
            "regulations",
            "Compliance Expert",
            "R",
            "Monitors regulatory changes and compliance",
        ),
        research(
            "competitor",
            "Competition Scout",
            "C",
            "Tracks competitor strategies and movements",
        ),
        research(
            "consumer",
            "Consumer Insights",
            "B",
            "Studies consumer behavior patterns",
        ),
        AgentRecord::new("strategy", "Strategy Advisor", Team::Research)
            .with_role("Recommender")
            .with_avatar("S")
            .with_description("Recommends marketing strategies")
            .locked(),
        creative(
            "writer",
            "Script Wizard",
            "Writer",
            "W",
            "Creates engaging scripts and copy",
        ),
        creative(
            "editor",
            "Content Polisher",
            "Editor",
            "E",
            "Refines and enhances content",
        ),
        creative(
            "illustrator",
            "DALL·E Artist",
            "Illustrator",
            "D",
            "Generates stunning visuals with DALL·E 3",
        ),
        creative(
            "voice",
            "Voice Crafter",
            "Audio",
            "V",
            "Creates voice content with ElevenLabs",
        ),
        creative(
            "animator",
            "Motion Master",
            "Animator",
            "A",
            "Brings content to life with animation",
        ),
    ]
}

fn responses() -> StaticTable {
    StaticTable::new(FALLBACK)
        .with(
            "industry",
            "Based on my analysis of industry trends, the market is trending toward more sustainable and eco-friendly products. Your campaign could highlight your environmental initiatives.",
        )
        .with(
            "regulations",
            "From a regulatory perspective, recent changes in digital advertising regulations require more transparent data usage policies. Make sure your campaign addresses this.",
        )
        .with(
            "competitor",
            "Looking at your competitors' strategies, your main competitors are focusing on emotional storytelling rather than product features. You might want to consider a similar approach.",
        )
        .with(
            "consumer",
            "Consumer behavior research indicates that consumers in your target demographic respond strongly to authenticity and social proof. Consider incorporating customer testimonials.",
        )
        .with(
            "strategy",
            "I recommend the following marketing strategy: combine digital channels with targeted physical experiences to create an omnichannel campaign that engages customers at multiple touchpoints.",
        )
        .with(
            "writer",
            "I've drafted this script for your campaign: \"Imagine a world where your brand isn't just a choice—it's the only choice that makes sense. Our product doesn't just solve problems; it transforms experiences.\"",
        )
        .with(
            "editor",
            "I've reviewed the content and suggest these improvements: Strengthen the call to action, simplify the technical jargon, and add more emotional triggers in the middle section.",
        )
        .with(
            "illustrator",
            "I can create visuals like this for your campaign: Modern, clean visuals with a vibrant color palette that evokes optimism and innovation, featuring your product in real-world scenarios.",
        )
        .with(
            "voice",
            "For the voice-over, I'd recommend this style and tone: A warm, conversational tone with moderate pacing—authoritative but friendly, using ElevenLabs voice generation to match your brand personality.",
        )
        .with(
            "animator",
            "For the animation sequence, I suggest: A smooth transition from problem scenario to solution, with subtle motion graphics highlighting key features and benefits.",
        )
}

pub fn pack() -> DomainPack {
    DomainPack {
        name: NAME.to_string(),
        welcome: Some(Welcome::system("Marketing Team", "M", WELCOME)),
        roster: Roster::builtin(agents()),
        lookup: responses(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::ResponseLookup;

    #[test]
    fn test_every_agent_has_a_scripted_reply() {
        let pack = pack();
        assert_eq!(pack.roster.len(), 10);
        for agent in pack.roster.agents() {
            assert!(pack.lookup.contains(&agent.id), "missing reply for {}", agent.id);
        }
    }

    #[test]
    fn test_marketing_roster_is_valid() {
        assert!(Roster::new(agents()).is_ok());
    }

    #[test]
    fn test_strategy_advisor_is_locked() {
        let pack = pack();
        let strategy = pack.roster.get("strategy").unwrap();
        assert!(!strategy.removable);
        assert!(strategy.active);
    }

    #[test]
    fn test_team_split() {
        let pack = pack();
        assert_eq!(pack.roster.list_by_team(Team::Research).len(), 5);
        assert_eq!(pack.roster.list_by_team(Team::Creative).len(), 5);
    }

    #[test]
    fn test_writer_reply_quotes_script() {
        let reply = pack().lookup.respond("writer", "launch campaign");
        assert!(reply.starts_with("I've drafted this script for your campaign: \""));
        assert!(reply.ends_with('"'));
    }
}
