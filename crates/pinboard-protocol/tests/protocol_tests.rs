//! Protocol layer tests — action parsing, event encoding, wire shapes.

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use pinboard_protocol::*;

    // ─────────────────────────────────────────────────────────────────────
    // Action parsing
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn join_parses_room_string() {
        let action = Action::parse(r#"{"action":"join","data":"/demo"}"#).unwrap();
        assert_eq!(action, Action::Join("/demo".into()));
    }

    #[test]
    fn initialize_parses_without_data() {
        let action = Action::parse(r#"{"action":"initialize"}"#).unwrap();
        assert_eq!(action, Action::Initialize);
    }

    #[test]
    fn delete_column_has_no_payload() {
        let action = Action::parse(r#"{"action":"delete-column"}"#).unwrap();
        assert_eq!(action, Action::DeleteColumn);
    }

    #[test]
    fn create_card_full_payload() {
        let wire = r#"{"action":"create-card","data":{"id":"c1","text":"hello","x":10,"y":20,"rot":-2.5,"colour":"yellow","type":"plain"}}"#;
        let action = Action::parse(wire).unwrap();
        match action {
            Action::CreateCard(card) => {
                assert_eq!(card.id, "c1");
                assert_eq!(card.text, "hello");
                assert_eq!(card.x, 10.0);
                assert_eq!(card.y, 20.0);
                assert_eq!(card.rot, -2.5);
                assert_eq!(card.colour, Colour::Yellow);
                assert_eq!(card.kind, CardKind::Plain);
            }
            other => panic!("expected create-card, got {other:?}"),
        }
    }

    #[test]
    fn create_card_missing_field_rejected() {
        // No colour
        let wire = r#"{"action":"create-card","data":{"id":"c1","text":"hi","x":1,"y":2,"rot":0,"type":"plain"}}"#;
        assert!(Action::parse(wire).is_err());
    }

    #[test]
    fn create_card_unknown_colour_rejected() {
        let wire = r#"{"action":"create-card","data":{"id":"c1","text":"hi","x":1,"y":2,"rot":0,"colour":"magenta","type":"plain"}}"#;
        assert!(Action::parse(wire).is_err());
    }

    #[test]
    fn edit_card_fields_are_optional() {
        let action = Action::parse(r#"{"action":"edit-card","data":{"id":"c1","text":"new"}}"#).unwrap();
        match action {
            Action::EditCard(edit) => {
                assert_eq!(edit.text.as_deref(), Some("new"));
                assert!(edit.colour.is_none());
            }
            other => panic!("expected edit-card, got {other:?}"),
        }

        let action = Action::parse(r#"{"action":"edit-card","data":{"id":"c1","colour":"red"}}"#).unwrap();
        match action {
            Action::EditCard(edit) => {
                assert!(edit.text.is_none());
                assert_eq!(edit.colour, Some(Colour::Red));
            }
            other => panic!("expected edit-card, got {other:?}"),
        }
    }

    #[test]
    fn move_card_nested_position() {
        let wire = r#"{"action":"move-card","data":{"id":"c1","position":{"left":30,"top":40}}}"#;
        let action = Action::parse(wire).unwrap();
        match action {
            Action::MoveCard(mv) => {
                assert_eq!(mv.id, "c1");
                assert_eq!(mv.position.left, 30.0);
                assert_eq!(mv.position.top, 40.0);
            }
            other => panic!("expected move-card, got {other:?}"),
        }
    }

    #[test]
    fn add_sticker_uses_camel_case_fields() {
        let wire = r#"{"action":"add-sticker","data":{"cardId":"c1","stickerId":"star"}}"#;
        let action = Action::parse(wire).unwrap();
        match action {
            Action::AddSticker(s) => {
                assert_eq!(s.card_id, "c1");
                assert_eq!(s.sticker_id, "star");
            }
            other => panic!("expected add-sticker, got {other:?}"),
        }
    }

    #[test]
    fn replace_columns_requires_sequence() {
        let ok = Action::parse(r#"{"action":"replace-columns","data":["To Do","Done"]}"#).unwrap();
        assert_eq!(ok, Action::ReplaceColumns(vec!["To Do".into(), "Done".into()]));

        assert!(Action::parse(r#"{"action":"replace-columns","data":"To Do"}"#).is_err());
        assert!(Action::parse(r#"{"action":"replace-columns","data":{"0":"To Do"}}"#).is_err());
        assert!(Action::parse(r#"{"action":"replace-columns"}"#).is_err());
    }

    #[test]
    fn set_theme_accepts_known_themes_only() {
        for (raw, theme) in [
            ("bigcards", Theme::Bigcards),
            ("mediumcards", Theme::Mediumcards),
            ("smallcards", Theme::Smallcards),
        ] {
            let wire = format!(r#"{{"action":"set-theme","data":"{raw}"}}"#);
            assert_eq!(Action::parse(&wire).unwrap(), Action::SetTheme(theme));
        }
        assert!(Action::parse(r#"{"action":"set-theme","data":"hugecards"}"#).is_err());
    }

    #[test]
    fn set_board_size_parses() {
        let action = Action::parse(r#"{"action":"set-board-size","data":{"width":1200,"height":600}}"#).unwrap();
        assert_eq!(
            action,
            Action::SetBoardSize(BoardSize { width: 1200.0, height: 600.0 })
        );
    }

    #[test]
    fn move_eraser_and_marker_parse() {
        let action = Action::parse(r#"{"action":"move-eraser","data":{"id":"eraser","x":70}}"#).unwrap();
        assert_eq!(action, Action::MoveEraser(MarkerPos { id: "eraser".into(), x: 70.0 }));

        let action = Action::parse(r#"{"action":"move-marker","data":{"id":"marker","x":215.5}}"#).unwrap();
        assert_eq!(action, Action::MoveMarker(MarkerPos { id: "marker".into(), x: 215.5 }));
    }

    #[test]
    fn set_display_name_string_data() {
        let action = Action::parse(r#"{"action":"set-display-name","data":"ada"}"#).unwrap();
        assert_eq!(action, Action::SetDisplayName("ada".into()));
    }

    #[test]
    fn unknown_action_rejected() {
        assert!(Action::parse(r#"{"action":"explode-board","data":{}}"#).is_err());
        assert!(Action::parse(r#"{"data":"/demo"}"#).is_err());
        assert!(Action::parse("not json at all").is_err());
    }

    #[test]
    fn field_order_does_not_matter() {
        let action = Action::parse(r#"{"data":"/demo","action":"join"}"#).unwrap();
        assert_eq!(action, Action::Join("/demo".into()));
    }

    #[test]
    fn extra_payload_fields_ignored() {
        // Clients may send more than the schema requires; the rest is dropped.
        let action = Action::parse(r#"{"action":"delete-card","data":{"id":"c1","legacy":true}}"#).unwrap();
        assert_eq!(action, Action::DeleteCard(CardRef { id: "c1".into() }));
    }

    #[test]
    fn action_names_match_wire_tags() {
        assert_eq!(Action::Initialize.name(), "initialize");
        assert_eq!(Action::DeleteColumn.name(), "delete-column");
        assert_eq!(Action::Join("x".into()).name(), "join");
        assert_eq!(Action::SetDisplayName("x".into()).name(), "set-display-name");
    }

    // ─────────────────────────────────────────────────────────────────────
    // Event encoding
    // ─────────────────────────────────────────────────────────────────────

    #[test]
    fn room_accept_encodes_without_data() {
        assert_eq!(Event::RoomAccept.encode(), r#"{"action":"room-accept"}"#);
    }

    #[test]
    fn join_announce_wire_shape() {
        let event = Event::JoinAnnounce(Presence {
            participant_id: "p1".into(),
            name: Some("ada".into()),
        });
        let parsed: serde_json::Value = serde_json::from_str(&event.encode()).unwrap();
        assert_eq!(parsed["action"], "join-announce");
        assert_eq!(parsed["data"]["participantId"], "p1");
        assert_eq!(parsed["data"]["name"], "ada");
    }

    #[test]
    fn join_announce_omits_unset_name() {
        let event = Event::JoinAnnounce(Presence { participant_id: "p1".into(), name: None });
        let parsed: serde_json::Value = serde_json::from_str(&event.encode()).unwrap();
        assert!(parsed["data"].get("name").is_none());
    }

    #[test]
    fn leave_announce_wire_shape() {
        let event = Event::LeaveAnnounce(ParticipantRef { participant_id: "p2".into() });
        let parsed: serde_json::Value = serde_json::from_str(&event.encode()).unwrap();
        assert_eq!(parsed["action"], "leave-announce");
        assert_eq!(parsed["data"]["participantId"], "p2");
    }

    #[test]
    fn init_cards_serializes_sticker_states() {
        let bare = Card {
            id: "c1".into(),
            text: "hi".into(),
            colour: Colour::White,
            x: 1.0,
            y: 2.0,
            rot: 0.0,
            kind: CardKind::Plain,
            sticker: None,
        };
        let mut stickers = BTreeSet::new();
        stickers.insert("star".into());
        stickers.insert("heart".into());
        let decorated = Card { id: "c2".into(), sticker: Some(stickers), ..bare.clone() };

        let event = Event::InitCards(vec![bare, decorated]);
        let parsed: serde_json::Value = serde_json::from_str(&event.encode()).unwrap();
        assert_eq!(parsed["action"], "init-cards");
        assert!(parsed["data"][0]["sticker"].is_null());
        assert_eq!(parsed["data"][0]["type"], "plain");
        // BTreeSet keeps the set ordered
        assert_eq!(parsed["data"][1]["sticker"], json!(["heart", "star"]));
    }

    #[test]
    fn column_echoes_use_bare_payloads() {
        let event = Event::CreateColumn("To Do".into());
        assert_eq!(event.encode(), r#"{"action":"create-column","data":"To Do"}"#);

        let event = Event::ReplaceColumns(vec!["A".into(), "B".into()]);
        let parsed: serde_json::Value = serde_json::from_str(&event.encode()).unwrap();
        assert_eq!(parsed["data"], json!(["A", "B"]));

        assert_eq!(Event::DeleteColumn.encode(), r#"{"action":"delete-column"}"#);
    }

    #[test]
    fn set_theme_data_is_bare_string() {
        let event = Event::SetTheme(Theme::Smallcards);
        assert_eq!(event.encode(), r#"{"action":"set-theme","data":"smallcards"}"#);
    }

    #[test]
    fn mutation_echo_roundtrips_as_action() {
        // An echoed mutation must parse back under the inbound catalog, so
        // a client can treat its own actions and roommate echoes uniformly.
        let echo = Event::MoveCard(MoveCard {
            id: "c9".into(),
            position: Position { left: 3.0, top: 4.0 },
        });
        let reparsed = Action::parse(&echo.encode()).unwrap();
        match reparsed {
            Action::MoveCard(mv) => assert_eq!(mv.id, "c9"),
            other => panic!("expected move-card, got {other:?}"),
        }
    }

    #[test]
    fn name_announce_wire_shape() {
        let event = Event::NameAnnounce(NameChange {
            participant_id: "p1".into(),
            name: "grace".into(),
        });
        let parsed: serde_json::Value = serde_json::from_str(&event.encode()).unwrap();
        assert_eq!(parsed["action"], "name-announce");
        assert_eq!(parsed["data"]["participantId"], "p1");
        assert_eq!(parsed["data"]["name"], "grace");
    }

    #[test]
    fn init_roommates_lists_presences() {
        let event = Event::InitRoommates(vec![
            Presence { participant_id: "p1".into(), name: Some("ada".into()) },
            Presence { participant_id: "p2".into(), name: None },
        ]);
        let parsed: serde_json::Value = serde_json::from_str(&event.encode()).unwrap();
        assert_eq!(parsed["action"], "init-roommates");
        assert_eq!(parsed["data"].as_array().unwrap().len(), 2);
        assert_eq!(parsed["data"][0]["name"], "ada");
    }
}
