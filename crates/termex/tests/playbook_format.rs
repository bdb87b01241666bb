// Test module - relaxed lint rules
#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::indexing_slicing)]
#![allow(missing_docs)]

//! Playbook parsing and serialization.

use termex::playbook::snapshot_xml;
use termex::{
    Attributes, Cell, Color, ErrorCode, Expectation, Playbook, PlaybookNode, Screen,
};

fn sample_screen() -> Screen {
    let mut screen = Screen::blank();
    for (col, ch) in "Hello".chars().enumerate() {
        screen.put(0, i32::try_from(col).unwrap(), Cell {
            ch,
            ..Cell::default()
        });
    }
    screen.put(
        2,
        0,
        Cell::styled('!', Attributes::Reverse, Color::Red, Color::Default),
    );
    screen.put(
        2,
        1,
        Cell::styled('?', Attributes::Normal, Color::Default, Color::Blue),
    );
    screen
}

#[test]
fn round_trip_preserves_structure() {
    let playbook = Playbook::new(vec![
        PlaybookNode::Action {
            key: "F4".to_string(),
        },
        PlaybookNode::Expect(Expectation {
            screen: sample_screen(),
        }),
        PlaybookNode::Action {
            key: "Enter".to_string(),
        },
    ]);

    let xml = playbook.to_xml().unwrap();
    let parsed = Playbook::from_xml(&xml).unwrap();
    assert_eq!(parsed, playbook);
}

#[test]
fn snapshot_allocates_keys_in_first_seen_order() {
    let xml = snapshot_xml(&sample_screen()).unwrap();
    // The reverse-red cell comes first in reading order, so it gets 'a'.
    assert!(xml.contains("<attr>ab"));
    assert!(xml.contains(
        "<color key=\"a\" attributes=\"reverse\" foreground=\"red\" background=\"default\" />"
    ));
    assert!(xml.contains(
        "<color key=\"b\" foreground=\"default\" background=\"blue\" />"
    ));
}

#[test]
fn all_default_snapshot_has_no_scheme() {
    let xml = snapshot_xml(&Screen::blank()).unwrap();
    assert!(!xml.contains("<scheme>"));
    assert!(!xml.contains("<attr>"));
}

#[test]
fn snapshot_rejects_too_many_color_combinations() {
    let mut screen = Screen::blank();
    let colors = [
        Color::Black,
        Color::Red,
        Color::Green,
        Color::Yellow,
        Color::Blue,
        Color::Magenta,
        Color::Cyan,
        Color::White,
        Color::Default,
    ];
    // 9 x 9 combinations minus the all-default one is well past the
    // 25-key limit.
    let mut col = 0;
    for fg in colors {
        for bg in colors {
            if fg == Color::Default && bg == Color::Default {
                continue;
            }
            screen.put(0, col % 80, Cell::styled('x', Attributes::Normal, fg, bg));
            screen.put(1 + col / 80, col % 80, Cell::styled('y', Attributes::Normal, fg, bg));
            col += 1;
        }
    }
    let err = snapshot_xml(&screen).unwrap_err();
    assert_eq!(err.code, ErrorCode::Internal);
}

#[test]
fn parse_rejects_wrong_root() {
    let err = Playbook::from_xml("<playbook></playbook>").unwrap_err();
    assert_eq!(err.code, ErrorCode::Playbook);
    assert!(err.message.contains("expected 'test'"));
}

#[test]
fn parse_rejects_expect_without_data() {
    let xml = "<test><expect><scheme/></expect></test>";
    let err = Playbook::from_xml(xml).unwrap_err();
    assert_eq!(err.code, ErrorCode::Playbook);
    assert!(err.message.contains("'data'"));
}

#[test]
fn parse_rejects_attr_length_mismatch() {
    let xml = "<test><expect><data><line>abc</line><attr>a</attr></data></expect></test>";
    let err = Playbook::from_xml(xml).unwrap_err();
    assert_eq!(err.code, ErrorCode::Playbook);
}

#[test]
fn parse_rejects_attr_without_line() {
    let xml = "<test><expect><data><attr>a</attr></data></expect></test>";
    let err = Playbook::from_xml(xml).unwrap_err();
    assert!(err.message.contains("follow a 'line'"));
}

#[test]
fn parse_rejects_undefined_color_key() {
    let xml = "<test><expect><data><line>x</line><attr>z</attr></data></expect></test>";
    let err = Playbook::from_xml(xml).unwrap_err();
    assert!(err.message.contains("'z'"));
}

#[test]
fn parse_rejects_unknown_action_key() {
    let xml = "<test><action key=\"F12\" /></test>";
    let err = Playbook::from_xml(xml).unwrap_err();
    assert_eq!(err.code, ErrorCode::Playbook);
}

#[test]
fn parse_rejects_action_without_key() {
    let xml = "<test><action /></test>";
    let err = Playbook::from_xml(xml).unwrap_err();
    assert!(err.message.contains("'key'"));
}

#[test]
fn parse_rejects_duplicate_data() {
    let xml = "<test><expect><data><line>x</line></data><data><line>y</line></data></expect></test>";
    let err = Playbook::from_xml(xml).unwrap_err();
    assert!(err.message.contains("more than one 'data'"));
}

#[test]
fn short_lines_are_padded_with_blanks() {
    let xml = "<test><expect><data><line>hi</line></data></expect></test>";
    let playbook = Playbook::from_xml(xml).unwrap();
    let PlaybookNode::Expect(expectation) = &playbook.nodes()[0] else {
        panic!("expected an expectation node");
    };
    assert_eq!(expectation.screen.cell(0, 0).map(|cell| cell.ch), Some('h'));
    assert_eq!(expectation.screen.cell(0, 2).map(|cell| cell.ch), Some(' '));
    assert_eq!(expectation.screen.cell(5, 0).map(|cell| cell.ch), Some(' '));
}

#[test]
fn scheme_applies_styling_to_keyed_cells() {
    let xml = concat!(
        "<test><expect><data>",
        "<line>ab</line><attr> c</attr>",
        "</data><scheme>",
        "<color key=\"c\" attributes=\"reverse\" foreground=\"green\" background=\"white\" />",
        "</scheme></expect></test>",
    );
    let playbook = Playbook::from_xml(xml).unwrap();
    let PlaybookNode::Expect(expectation) = &playbook.nodes()[0] else {
        panic!("expected an expectation node");
    };
    let styled = expectation.screen.cell(0, 1).copied().unwrap();
    assert_eq!(styled.attr, Attributes::Reverse);
    assert_eq!((styled.fg, styled.bg), (Color::Green, Color::White));
    let plain = expectation.screen.cell(0, 0).copied().unwrap();
    assert_eq!(plain.attr, Attributes::Normal);
}

#[test]
fn save_and_load_round_trip_through_a_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("session.xml");

    let playbook = Playbook::new(vec![
        PlaybookNode::Action {
            key: "PageDown".to_string(),
        },
        PlaybookNode::Expect(Expectation {
            screen: sample_screen(),
        }),
    ]);
    playbook.save(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("<?xml version='1.0' encoding='utf-8'?>"));

    assert_eq!(Playbook::load(&path).unwrap(), playbook);
}

#[test]
fn load_of_missing_file_is_an_io_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = Playbook::load(&dir.path().join("absent.xml")).unwrap_err();
    assert_eq!(err.code, ErrorCode::Io);
}

#[test]
fn xml_special_characters_survive_round_trip() {
    let mut screen = Screen::blank();
    for (col, ch) in "<&>\"".chars().enumerate() {
        screen.put(0, i32::try_from(col).unwrap(), Cell {
            ch,
            ..Cell::default()
        });
    }
    let playbook = Playbook::new(vec![PlaybookNode::Expect(Expectation { screen })]);
    let parsed = Playbook::from_xml(&playbook.to_xml().unwrap()).unwrap();
    assert_eq!(parsed, playbook);
}
