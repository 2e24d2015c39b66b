//! Render Step
//!
//! Turns the current city state into an ordered draw list. Nothing here
//! mutates the world; a front end paints the commands in order, and
//! `Frame::to_ascii` does the same for a terminal.

use serde::{Deserialize, Serialize};

use city_events::{AgentSnapshot, ConversationKey};

use crate::components::map::{CityMap, RoadAxis, Structure, StructureKind};
use crate::systems::conversation::Conversations;

/// Bubble text shown while a conversation's lines are still being generated
pub const PENDING_BUBBLE: &str = "...";

/// Bubbles float this far above the speaker, in tiles
const BUBBLE_OFFSET: f32 = 0.6;

/// One thing to paint, in tile coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "draw", rename_all = "snake_case")]
pub enum DrawCommand {
    /// A full-length road line; `at` is y for horizontal roads, x for vertical
    Road { axis: RoadAxis, at: f32 },
    Structure(Structure),
    Agent {
        id: u32,
        name: String,
        x: f32,
        y: f32,
        heading: f32,
        interacting: bool,
    },
    SpeechBubble {
        key: ConversationKey,
        x: f32,
        y: f32,
        speaker: Option<String>,
        text: String,
    },
}

/// A complete draw list for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub width: f32,
    pub height: f32,
    pub commands: Vec<DrawCommand>,
}

/// Build the draw list: roads, then structures, then agents, then bubbles.
pub fn render_frame(
    map: &CityMap,
    agents: &[AgentSnapshot],
    conversations: &Conversations,
    now_ms: u64,
    line_interval_ms: u64,
) -> Frame {
    let mut commands = Vec::new();

    for at in &map.horizontal_roads {
        commands.push(DrawCommand::Road {
            axis: RoadAxis::Horizontal,
            at: *at,
        });
    }
    for at in &map.vertical_roads {
        commands.push(DrawCommand::Road {
            axis: RoadAxis::Vertical,
            at: *at,
        });
    }

    commands.extend(map.structures().cloned().map(DrawCommand::Structure));

    for agent in agents {
        commands.push(DrawCommand::Agent {
            id: agent.id,
            name: agent.name.clone(),
            x: agent.x,
            y: agent.y,
            heading: agent.heading,
            interacting: agent.interacting,
        });
    }

    for conversation in conversations.iter() {
        let bubble = match conversation.current_line(now_ms, line_interval_ms) {
            Some((_, line)) => {
                let speaker_id = conversation.speaker_of(line);
                let anchor = agents
                    .iter()
                    .find(|a| a.id == speaker_id)
                    .map(|a| (a.x, a.y))
                    .unwrap_or((conversation.midpoint.x, conversation.midpoint.y));
                DrawCommand::SpeechBubble {
                    key: conversation.key,
                    x: anchor.0,
                    y: anchor.1 - BUBBLE_OFFSET,
                    speaker: Some(line.speaker.clone()),
                    text: line.message.clone(),
                }
            }
            None => DrawCommand::SpeechBubble {
                key: conversation.key,
                x: conversation.midpoint.x,
                y: conversation.midpoint.y - BUBBLE_OFFSET,
                speaker: None,
                text: PENDING_BUBBLE.to_string(),
            },
        };
        commands.push(bubble);
    }

    Frame {
        width: map.width,
        height: map.height,
        commands,
    }
}

fn cell(value: f32, limit: usize) -> Option<usize> {
    let index = value.round();
    if index < 0.0 || index as usize > limit {
        None
    } else {
        Some(index as usize)
    }
}

impl Frame {
    pub fn agent_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::Agent { .. }))
            .count()
    }

    pub fn bubbles(&self) -> impl Iterator<Item = &DrawCommand> {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCommand::SpeechBubble { .. }))
    }

    /// Rasterise to one character per tile, followed by one line per bubble.
    pub fn to_ascii(&self) -> String {
        let max_col = self.width.ceil().max(0.0) as usize;
        let max_row = self.height.ceil().max(0.0) as usize;
        let mut grid = vec![vec![' '; max_col + 1]; max_row + 1];
        let mut captions = Vec::new();

        for command in &self.commands {
            match command {
                DrawCommand::Road { axis, at } => match axis {
                    RoadAxis::Horizontal => {
                        if let Some(row) = cell(*at, max_row) {
                            for slot in grid[row].iter_mut() {
                                *slot = if *slot == '.' { '+' } else { '.' };
                            }
                        }
                    }
                    RoadAxis::Vertical => {
                        if let Some(col) = cell(*at, max_col) {
                            for row in grid.iter_mut() {
                                row[col] = if row[col] == '.' { '+' } else { '.' };
                            }
                        }
                    }
                    RoadAxis::Intersection | RoadAxis::OffRoad => {}
                },
                DrawCommand::Structure(structure) => {
                    let glyph = match structure.kind {
                        StructureKind::Building => 'B',
                        StructureKind::House => 'h',
                    };
                    let cols = structure.x.floor().max(0.0) as usize
                        ..((structure.x + structure.width).ceil() as usize).min(max_col + 1);
                    let rows = structure.y.floor().max(0.0) as usize
                        ..((structure.y + structure.height).ceil() as usize).min(max_row + 1);
                    for row in rows {
                        for col in cols.clone() {
                            grid[row][col] = glyph;
                        }
                    }
                }
                DrawCommand::Agent {
                    id,
                    x,
                    y,
                    interacting,
                    ..
                } => {
                    if let (Some(col), Some(row)) = (cell(*x, max_col), cell(*y, max_row)) {
                        grid[row][col] = if *interacting {
                            '*'
                        } else {
                            char::from_digit(id % 36, 36).unwrap_or('?')
                        };
                    }
                }
                DrawCommand::SpeechBubble {
                    key, speaker, text, ..
                } => {
                    let caption = match speaker {
                        Some(speaker) => format!("[{}] {}: {}", key, speaker, text),
                        None => format!("[{}] {}", key, text),
                    };
                    captions.push(caption);
                }
            }
        }

        let mut out = String::new();
        for row in grid {
            let line: String = row.into_iter().collect();
            out.push_str(line.trim_end());
            out.push('\n');
        }
        for caption in captions {
            out.push_str(&caption);
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::agent::TilePosition;
    use crate::systems::conversation::Conversation;
    use city_events::DialogueLine;

    fn agent(id: u32, name: &str, x: f32, y: f32, interacting: bool) -> AgentSnapshot {
        AgentSnapshot {
            id,
            name: name.to_string(),
            x,
            y,
            heading: 0.0,
            interacting,
        }
    }

    fn talking() -> (Vec<AgentSnapshot>, Conversations) {
        let agents = vec![
            agent(1, "Nova", 8.0, 6.0, true),
            agent(2, "Orion", 8.0, 6.2, true),
        ];
        let mut conversations = Conversations::new();
        conversations.insert(Conversation::new(
            ConversationKey::new(1, 2).unwrap(),
            ["Nova".into(), "Orion".into()],
            0,
            30_000,
            TilePosition::new(8.0, 6.1),
        ));
        (agents, conversations)
    }

    #[test]
    fn test_draw_order() {
        let map = CityMap::default();
        let (agents, conversations) = talking();
        let frame = render_frame(&map, &agents, &conversations, 0, 3000);

        let first_structure = frame
            .commands
            .iter()
            .position(|c| matches!(c, DrawCommand::Structure(_)))
            .unwrap();
        let first_agent = frame
            .commands
            .iter()
            .position(|c| matches!(c, DrawCommand::Agent { .. }))
            .unwrap();
        assert!(matches!(frame.commands[0], DrawCommand::Road { .. }));
        assert!(first_structure < first_agent);
        assert!(matches!(frame.commands.last(), Some(DrawCommand::SpeechBubble { .. })));
        assert_eq!(frame.agent_count(), 2);
    }

    #[test]
    fn test_pending_conversation_shows_placeholder() {
        let map = CityMap::default();
        let (agents, conversations) = talking();
        let frame = render_frame(&map, &agents, &conversations, 1000, 3000);

        let bubble = frame.bubbles().next().unwrap();
        match bubble {
            DrawCommand::SpeechBubble { speaker, text, x, .. } => {
                assert!(speaker.is_none());
                assert_eq!(text, PENDING_BUBBLE);
                assert_eq!(*x, 8.0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_bubble_follows_speaker() {
        let map = CityMap::default();
        let (agents, mut conversations) = talking();
        let key = ConversationKey::new(1, 2).unwrap();
        let lines = vec![
            DialogueLine::new("Nova", "hi", ""),
            DialogueLine::new("Orion", "hello", ""),
        ];
        conversations.get_mut(&key).unwrap().populate(lines, false, 0);

        let frame = render_frame(&map, &agents, &conversations, 3500, 3000);
        let bubble = frame.bubbles().next().unwrap();
        match bubble {
            DrawCommand::SpeechBubble { speaker, text, y, .. } => {
                assert_eq!(speaker.as_deref(), Some("Orion"));
                assert_eq!(text, "hello");
                assert!((*y - (6.2 - BUBBLE_OFFSET)).abs() < 1e-5);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_ascii_layout() {
        let map = CityMap::default();
        let agents = vec![agent(3, "Lyra", 8.0, 6.0, false)];
        let frame = render_frame(&map, &agents, &Conversations::new(), 0, 3000);
        let ascii = frame.to_ascii();
        let rows: Vec<&str> = ascii.lines().collect();

        assert_eq!(rows.len(), 20);
        assert_eq!(rows[6].chars().nth(16), Some('+'));
        assert_eq!(rows[6].chars().nth(8), Some('3'));
        assert_eq!(rows[3].chars().nth(8), Some('.'));
        assert_eq!(rows[2].chars().nth(2), Some('B'));
        assert_eq!(rows[2].chars().nth(4), Some('h'));
        assert_eq!(rows[11].chars().nth(4), Some('h'));
        assert_eq!(rows[12].chars().nth(4), Some('.'));
    }

    #[test]
    fn test_ascii_marks_talking_agents() {
        let map = CityMap::default();
        let (agents, conversations) = talking();
        let ascii = render_frame(&map, &agents, &conversations, 0, 3000).to_ascii();
        assert!(ascii.contains('*'));
        assert!(ascii.contains("[1-2] ..."));
    }
}
