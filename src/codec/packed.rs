//! Compact text encoding
//!
//! A frame is a tag followed by `|`-separated fields:
//!
//! ```text
//! player_list|2#1|5:Al|ce|0;2|3:Bob|2
//! ```
//!
//! - numbers are decimal, bools are `1`/`0`, an absent optional is `-`
//! - enums are their snake_case / SCREAMING_SNAKE_CASE names
//! - strings are `<byte-len>:<bytes>`, so their content is never escaped
//! - a list is `<count>#` followed by entries separated by `;`, with the
//!   entry's own fields separated by `|`
//!
//! A list is always the last field of its frame. Entries that fail to parse
//! are dropped and decoding resumes after the next `;`, until the announced
//! number of entries has been read or the frame ends.

use super::{CodecError, WireCodec};
use crate::protocol::{ClientMessage, PlayerSummary, ServerMessage};
use crate::types::{ClientId, Question, QuestionId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default)]
pub struct PackedCodec;

fn num(value: impl Display) -> String {
    value.to_string()
}

fn flag(value: bool) -> String {
    let s = if value { "1" } else { "0" };
    s.to_string()
}

fn opt(value: Option<impl Display>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn text(value: &str) -> String {
    format!("{}:{}", value.len(), value)
}

fn name<T: Serialize>(value: &T) -> Result<String, CodecError> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(CodecError::BadField(other.to_string())),
    }
}

fn list<T>(items: &[T], entry: impl Fn(&T) -> Vec<String>) -> String {
    let entries: Vec<String> = items.iter().map(|item| entry(item).join("|")).collect();
    format!("{}#{}", items.len(), entries.join(";"))
}

fn frame(tag: &str, fields: Vec<String>) -> String {
    let mut out = tag.to_string();
    for field in fields {
        out.push('|');
        out.push_str(&field);
    }
    out
}

fn player_entry(p: &PlayerSummary) -> Vec<String> {
    vec![num(p.client_id), text(&p.display_name), num(p.score)]
}

fn read_player(r: &mut Reader<'_>) -> Result<PlayerSummary, CodecError> {
    let client_id = ClientId(r.int()?);
    r.expect(b'|')?;
    let display_name = r.string()?;
    r.expect(b'|')?;
    let score = r.int()?;
    Ok(PlayerSummary {
        client_id,
        display_name,
        score,
    })
}

/// Cursor over one frame
struct Reader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Result<(), CodecError> {
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(CodecError::BadField(self.rest().to_string())),
            None => Err(CodecError::UnexpectedEnd),
        }
    }

    /// Next field start, i.e. a `|` followed by the field
    fn field(&mut self) -> Result<(), CodecError> {
        self.expect(b'|')
    }

    /// Raw text up to the next delimiter
    fn token(&mut self) -> &'a str {
        let rest = self.rest();
        let end = rest.find(['|', ';']).unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn int<T: FromStr>(&mut self) -> Result<T, CodecError> {
        let token = self.token();
        token
            .parse()
            .map_err(|_| CodecError::BadField(token.to_string()))
    }

    fn flag(&mut self) -> Result<bool, CodecError> {
        match self.token() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(CodecError::BadField(other.to_string())),
        }
    }

    fn opt<T: FromStr>(&mut self) -> Result<Option<T>, CodecError> {
        if self.rest().starts_with('-') {
            let token = self.token();
            if token == "-" {
                return Ok(None);
            }
            return token
                .parse()
                .map(Some)
                .map_err(|_| CodecError::BadField(token.to_string()));
        }
        self.int().map(Some)
    }

    fn name<T: DeserializeOwned>(&mut self) -> Result<T, CodecError> {
        let token = self.token();
        serde_json::from_value(serde_json::Value::String(token.to_string()))
            .map_err(|_| CodecError::BadField(token.to_string()))
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let rest = self.rest();
        let colon = rest
            .find(':')
            .ok_or_else(|| CodecError::BadField(rest.to_string()))?;
        let len: usize = rest[..colon]
            .parse()
            .map_err(|_| CodecError::BadField(rest[..colon].to_string()))?;

        let start = self.pos + colon + 1;
        let end = start.checked_add(len).ok_or(CodecError::UnexpectedEnd)?;
        // Also fails if the length lands inside a multi-byte character
        let value = self.input.get(start..end).ok_or(CodecError::UnexpectedEnd)?;
        self.pos = end;
        Ok(value.to_string())
    }

    /// Skip past the next `;`, or to the end of the frame
    fn skip_entry(&mut self) {
        match self.rest().find(';') {
            Some(i) => self.pos += i + 1,
            None => self.pos = self.input.len(),
        }
    }

    fn list<T>(
        &mut self,
        mut entry: impl FnMut(&mut Self) -> Result<T, CodecError>,
    ) -> Result<Vec<T>, CodecError> {
        let rest = self.rest();
        let hash = rest
            .find('#')
            .ok_or_else(|| CodecError::BadField(rest.to_string()))?;
        let count: usize = rest[..hash]
            .parse()
            .map_err(|_| CodecError::BadField(rest[..hash].to_string()))?;
        self.pos += hash + 1;

        // Entries are read until `count` of them parsed or the frame ends.
        // A dropped entry may have contained `;` inside a string, so the
        // attempt count says nothing about how many entries are left.
        let mut items = Vec::with_capacity(count.min(64));
        let mut dropped = false;
        while items.len() < count && !self.at_end() {
            let start = self.pos;
            let result = entry(self);
            let terminated = self.at_end() || self.peek() == Some(b';');
            match result {
                Ok(item) if terminated => {
                    self.pos += usize::from(!self.at_end());
                    items.push(item);
                }
                Ok(_) => {
                    tracing::debug!("Dropping list entry with trailing data");
                    dropped = true;
                    self.pos = start;
                    self.skip_entry();
                }
                Err(e) => {
                    tracing::debug!("Dropping malformed list entry: {}", e);
                    dropped = true;
                    self.pos = start;
                    self.skip_entry();
                }
            }
        }

        // After a resync the rest of the frame is leftovers of broken entries
        if dropped && !self.at_end() {
            tracing::debug!("Discarding {} bytes after list", self.rest().len());
            self.pos = self.input.len();
        }

        Ok(items)
    }

    fn finish(&self) -> Result<(), CodecError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(CodecError::TrailingData)
        }
    }
}

impl PackedCodec {
    /// Client side of the codec
    pub fn encode_client(&self, msg: &ClientMessage) -> Result<String, CodecError> {
        Ok(match msg {
            ClientMessage::SubmitProfile {
                display_name,
                question_ids,
                answers,
            } => {
                // Sent as pairs; unpaired entries would be ignored anyway
                let pairs: Vec<(QuestionId, &String)> =
                    question_ids.iter().copied().zip(answers).collect();
                frame(
                    "submit_profile",
                    vec![
                        text(display_name),
                        list(&pairs, |(id, answer)| vec![num(id), text(answer)]),
                    ],
                )
            }
            ClientMessage::SubmitGuess { text: guess } => frame("submit_guess", vec![text(guess)]),
            ClientMessage::SubmitJudgement { is_correct } => {
                frame("submit_judgement", vec![flag(*is_correct)])
            }
            ClientMessage::HostStartGame => frame("host_start_game", vec![]),
            ClientMessage::HostSkipRound => frame("host_skip_round", vec![]),
            ClientMessage::HostEndGame => frame("host_end_game", vec![]),
            ClientMessage::HostResetGame => frame("host_reset_game", vec![]),
        })
    }

    pub fn decode_server(&self, input: &str) -> Result<ServerMessage, CodecError> {
        let mut r = Reader::new(input);
        let tag = r.token();

        let msg = match tag {
            "" => return Err(CodecError::Empty),
            "welcome" => {
                r.field()?;
                let protocol = r.string()?;
                r.field()?;
                let client_id = ClientId(r.int()?);
                r.field()?;
                let role = r.name()?;
                r.field()?;
                let phase = r.name()?;
                r.field()?;
                let server_now = r.string()?;
                ServerMessage::Welcome {
                    protocol,
                    client_id,
                    role,
                    phase,
                    server_now,
                }
            }
            "player_list" => {
                r.field()?;
                ServerMessage::PlayerList {
                    players: r.list(read_player)?,
                }
            }
            "question_catalog" => {
                r.field()?;
                let questions = r.list(|r| {
                    let id = QuestionId(r.int()?);
                    r.expect(b'|')?;
                    let text = r.string()?;
                    Ok(Question { id, text })
                })?;
                ServerMessage::QuestionCatalog { questions }
            }
            "profile_progress" => {
                r.field()?;
                let submitted = r.int()?;
                r.field()?;
                let total = r.int()?;
                ServerMessage::ProfileProgress { submitted, total }
            }
            "phase" => {
                r.field()?;
                let phase = r.name()?;
                r.field()?;
                let round_no = r.int()?;
                r.field()?;
                let server_now = r.string()?;
                ServerMessage::Phase {
                    phase,
                    round_no,
                    server_now,
                }
            }
            "round_started" => {
                r.field()?;
                let round_no = r.int()?;
                r.field()?;
                let round_type = r.name()?;
                r.field()?;
                let target = ClientId(r.int()?);
                r.field()?;
                let guesser = r.opt()?.map(ClientId);
                r.field()?;
                let question_id = QuestionId(r.int()?);
                r.field()?;
                let question_text = r.string()?;
                r.field()?;
                let round_time_seconds = r.int()?;
                ServerMessage::RoundStarted {
                    round_no,
                    round_type,
                    target,
                    guesser,
                    question_id,
                    question_text,
                    round_time_seconds,
                }
            }
            "judgement_requested" => {
                r.field()?;
                let target = ClientId(r.int()?);
                r.field()?;
                let guesser = ClientId(r.int()?);
                r.field()?;
                let question_id = QuestionId(r.int()?);
                r.field()?;
                let question_text = r.string()?;
                r.field()?;
                let original_answer = r.string()?;
                r.field()?;
                let guess_text = r.string()?;
                ServerMessage::JudgementRequested {
                    target,
                    guesser,
                    question_id,
                    question_text,
                    original_answer,
                    guess_text,
                }
            }
            "judgement_announcement" => {
                r.field()?;
                let is_correct = r.flag()?;
                r.field()?;
                let question_id = QuestionId(r.int()?);
                r.field()?;
                let question_text = r.string()?;
                r.field()?;
                let original_answer = r.string()?;
                r.field()?;
                let guess_text = r.string()?;
                ServerMessage::JudgementAnnouncement {
                    is_correct,
                    question_id,
                    question_text,
                    original_answer,
                    guess_text,
                }
            }
            "round_result" => {
                r.field()?;
                let is_correct = r.flag()?;
                r.field()?;
                let player_scores = r.list(read_player)?;
                ServerMessage::RoundResult {
                    is_correct,
                    player_scores,
                }
            }
            "round_abandoned" => {
                r.field()?;
                let round_no = r.int()?;
                r.field()?;
                let reason = r.string()?;
                ServerMessage::RoundAbandoned { round_no, reason }
            }
            "game_over" => {
                r.field()?;
                ServerMessage::GameOver {
                    standings: r.list(read_player)?,
                }
            }
            "error" => {
                r.field()?;
                let code = r.string()?;
                r.field()?;
                let msg = r.string()?;
                ServerMessage::Error { code, msg }
            }
            other => return Err(CodecError::UnknownTag(other.to_string())),
        };

        r.finish()?;
        Ok(msg)
    }
}

impl WireCodec for PackedCodec {
    fn encode(&self, msg: &ServerMessage) -> Result<String, CodecError> {
        let fields = match msg {
            ServerMessage::Welcome {
                protocol,
                client_id,
                role,
                phase,
                server_now,
            } => vec![
                text(protocol),
                num(client_id),
                name(role)?,
                name(phase)?,
                text(server_now),
            ],
            ServerMessage::PlayerList { players } => vec![list(players, player_entry)],
            ServerMessage::QuestionCatalog { questions } => {
                vec![list(questions, |q| vec![num(q.id), text(&q.text)])]
            }
            ServerMessage::ProfileProgress { submitted, total } => {
                vec![num(submitted), num(total)]
            }
            ServerMessage::Phase {
                phase,
                round_no,
                server_now,
            } => vec![name(phase)?, num(round_no), text(server_now)],
            ServerMessage::RoundStarted {
                round_no,
                round_type,
                target,
                guesser,
                question_id,
                question_text,
                round_time_seconds,
            } => vec![
                num(round_no),
                name(round_type)?,
                num(target),
                opt(*guesser),
                num(question_id),
                text(question_text),
                num(round_time_seconds),
            ],
            ServerMessage::JudgementRequested {
                target,
                guesser,
                question_id,
                question_text,
                original_answer,
                guess_text,
            } => vec![
                num(target),
                num(guesser),
                num(question_id),
                text(question_text),
                text(original_answer),
                text(guess_text),
            ],
            ServerMessage::JudgementAnnouncement {
                is_correct,
                question_id,
                question_text,
                original_answer,
                guess_text,
            } => vec![
                flag(*is_correct),
                num(question_id),
                text(question_text),
                text(original_answer),
                text(guess_text),
            ],
            ServerMessage::RoundResult {
                is_correct,
                player_scores,
            } => vec![flag(*is_correct), list(player_scores, player_entry)],
            ServerMessage::RoundAbandoned { round_no, reason } => {
                vec![num(round_no), text(reason)]
            }
            ServerMessage::GameOver { standings } => vec![list(standings, player_entry)],
            ServerMessage::Error { code, msg } => vec![text(code), text(msg)],
        };

        Ok(frame(msg.tag(), fields))
    }

    fn decode(&self, input: &str) -> Result<ClientMessage, CodecError> {
        let mut r = Reader::new(input);
        let tag = r.token();

        let msg = match tag {
            "" => return Err(CodecError::Empty),
            "submit_profile" => {
                r.field()?;
                let display_name = r.string()?;
                r.field()?;
                let pairs = r.list(|r| {
                    let id = QuestionId(r.int()?);
                    r.expect(b'|')?;
                    let answer = r.string()?;
                    Ok((id, answer))
                })?;
                let (question_ids, answers) = pairs.into_iter().unzip();
                ClientMessage::SubmitProfile {
                    display_name,
                    question_ids,
                    answers,
                }
            }
            "submit_guess" => {
                r.field()?;
                ClientMessage::SubmitGuess { text: r.string()? }
            }
            "submit_judgement" => {
                r.field()?;
                ClientMessage::SubmitJudgement {
                    is_correct: r.flag()?,
                }
            }
            "host_start_game" => ClientMessage::HostStartGame,
            "host_skip_round" => ClientMessage::HostSkipRound,
            "host_end_game" => ClientMessage::HostEndGame,
            "host_reset_game" => ClientMessage::HostResetGame,
            other => return Err(CodecError::UnknownTag(other.to_string())),
        };

        r.finish()?;
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GamePhase, Role, RoundType};

    fn player(id: u64, name: &str, score: u32) -> PlayerSummary {
        PlayerSummary {
            client_id: ClientId(id),
            display_name: name.to_string(),
            score,
        }
    }

    #[test]
    fn test_player_list_layout() {
        let msg = ServerMessage::PlayerList {
            players: vec![player(1, "Al|ce", 0), player(2, "Bob", 2)],
        };
        assert_eq!(
            PackedCodec.encode(&msg).unwrap(),
            "player_list|2#1|5:Al|ce|0;2|3:Bob|2"
        );
    }

    #[test]
    fn test_delimiters_in_names_survive() {
        let players = vec![
            player(1, "a|b;c", 3),
            player(2, "x:y#z", 0),
            player(3, "", 1),
            player(4, "Zoë ☕", 7),
        ];
        let frame = PackedCodec
            .encode(&ServerMessage::PlayerList {
                players: players.clone(),
            })
            .unwrap();

        assert_eq!(
            PackedCodec.decode_server(&frame).unwrap(),
            ServerMessage::PlayerList { players }
        );
    }

    #[test]
    fn test_malformed_entries_are_dropped() {
        // Second entry has a non-numeric id, third a string running past its
        // entry, fourth is fine
        let frame = "player_list|4#1|3:Ann|2;x|3:Bob|0;3|9:Ca|1;4|3:Dee|5";
        let msg = PackedCodec.decode_server(frame).unwrap();

        assert_eq!(
            msg,
            ServerMessage::PlayerList {
                players: vec![player(1, "Ann", 2), player(4, "Dee", 5)],
            }
        );
    }

    #[test]
    fn test_resync_past_separator_inside_broken_entry() {
        // The broken entry's name holds a `;`, so the resync lands inside it
        let msg = PackedCodec
            .decode("submit_profile|3:Ann|2#x|3:a;b;2|3:Red")
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::SubmitProfile {
                display_name: "Ann".to_string(),
                question_ids: vec![QuestionId(2)],
                answers: vec!["Red".to_string()],
            }
        );

        let msg = PackedCodec
            .decode_server("player_list|2#x|3:a;b|0;2|3:Bob|2")
            .unwrap();
        assert_eq!(
            msg,
            ServerMessage::PlayerList {
                players: vec![player(2, "Bob", 2)],
            }
        );
    }

    #[test]
    fn test_extra_entries_without_errors_are_trailing_data() {
        assert!(matches!(
            PackedCodec.decode_server("game_over|1#1|1:A|4;2|1:B|0"),
            Err(CodecError::TrailingData)
        ));
    }

    #[test]
    fn test_short_list_keeps_what_is_there() {
        let msg = PackedCodec.decode_server("game_over|3#1|1:A|4").unwrap();
        assert_eq!(
            msg,
            ServerMessage::GameOver {
                standings: vec![player(1, "A", 4)],
            }
        );
    }

    #[test]
    fn test_broken_top_level_field_is_an_error() {
        assert!(matches!(
            PackedCodec.decode_server("profile_progress|x|2"),
            Err(CodecError::BadField(_))
        ));
        assert!(matches!(
            PackedCodec.decode("submit_guess|10:short"),
            Err(CodecError::UnexpectedEnd)
        ));
        assert!(matches!(
            PackedCodec.decode("submit_judgement|1|extra"),
            Err(CodecError::TrailingData)
        ));
        assert!(matches!(
            PackedCodec.decode("submit_judgement|yes"),
            Err(CodecError::BadField(_))
        ));
    }

    #[test]
    fn test_unknown_tag_and_empty_frame() {
        assert!(matches!(
            PackedCodec.decode("launch_rockets|1"),
            Err(CodecError::UnknownTag(tag)) if tag == "launch_rockets"
        ));
        assert!(matches!(PackedCodec.decode(""), Err(CodecError::Empty)));
    }

    #[test]
    fn test_round_started_optional_guesser() {
        let msg = ServerMessage::RoundStarted {
            round_no: 3,
            round_type: RoundType::EveryoneGuessesOne,
            target: ClientId(0),
            guesser: None,
            question_id: QuestionId(4),
            question_text: "Dream job?".to_string(),
            round_time_seconds: 20.0,
        };
        let frame = PackedCodec.encode(&msg).unwrap();

        assert_eq!(
            frame,
            "round_started|3|everyone_guesses_one|0|-|4|10:Dream job?|20"
        );
        assert_eq!(PackedCodec.decode_server(&frame).unwrap(), msg);
    }

    #[test]
    fn test_welcome_and_phase_names() {
        let msg = ServerMessage::Welcome {
            protocol: "1".to_string(),
            client_id: ClientId(5),
            role: Role::Display,
            phase: GamePhase::ReviewingAnswer,
            server_now: "2024-01-01T00:00:00+00:00".to_string(),
        };
        let frame = PackedCodec.encode(&msg).unwrap();

        assert!(frame.starts_with("welcome|1:1|5|display|REVIEWING_ANSWER|"));
        assert_eq!(PackedCodec.decode_server(&frame).unwrap(), msg);
    }

    #[test]
    fn test_submit_profile_pairs() {
        let msg = ClientMessage::SubmitProfile {
            display_name: "Ann;Lee".to_string(),
            question_ids: vec![QuestionId(1), QuestionId(2), QuestionId(3)],
            answers: vec!["Blue|Green".to_string(), "Pizza".to_string()],
        };
        let frame = PackedCodec.encode_client(&msg).unwrap();
        assert_eq!(
            frame,
            "submit_profile|7:Ann;Lee|2#1|10:Blue|Green;2|5:Pizza"
        );

        assert_eq!(
            PackedCodec.decode(&frame).unwrap(),
            ClientMessage::SubmitProfile {
                display_name: "Ann;Lee".to_string(),
                question_ids: vec![QuestionId(1), QuestionId(2)],
                answers: vec!["Blue|Green".to_string(), "Pizza".to_string()],
            }
        );
    }

    #[test]
    fn test_host_commands() {
        for msg in [
            ClientMessage::HostStartGame,
            ClientMessage::HostSkipRound,
            ClientMessage::HostEndGame,
            ClientMessage::HostResetGame,
        ] {
            let frame = PackedCodec.encode_client(&msg).unwrap();
            assert!(!frame.contains('|'));
            assert_eq!(PackedCodec.decode(&frame).unwrap(), msg);
        }
    }
}
