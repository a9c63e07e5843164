use super::*;

#[test]
fn test_source_description_round_trip() -> Result<(), util::Error> {
    let sdes = SourceDescription::with_cname(0x902F9E2E, "{9c00eb92-1afb-9d49-a47d-91f64eee69f5}");

    let raw = sdes.marshal()?;
    assert_eq!(raw.len() % 4, 0);

    let mut buf = raw.clone();
    let parsed = SourceDescription::unmarshal(&mut buf)?;
    assert_eq!(parsed, sdes);
    Ok(())
}

#[test]
fn test_source_description_multiple_chunks() -> Result<(), util::Error> {
    let sdes = SourceDescription {
        chunks: vec![
            SourceDescriptionChunk {
                source: 1,
                items: vec![SourceDescriptionItem {
                    sdes_type: SdesType::SdesCname,
                    text: "a".to_owned(),
                }],
            },
            SourceDescriptionChunk {
                source: 2,
                items: vec![
                    SourceDescriptionItem {
                        sdes_type: SdesType::SdesCname,
                        text: "bcd".to_owned(),
                    },
                    SourceDescriptionItem {
                        sdes_type: SdesType::SdesTool,
                        text: "switchboard".to_owned(),
                    },
                ],
            },
        ],
    };

    let raw = sdes.marshal()?;
    let mut buf = raw.clone();
    let parsed = SourceDescription::unmarshal(&mut buf)?;
    assert_eq!(parsed, sdes);
    assert_eq!(parsed.destination_ssrc(), vec![1, 2]);
    Ok(())
}

#[test]
fn test_source_description_item_missing_type_rejected() {
    let sdes = SourceDescription {
        chunks: vec![SourceDescriptionChunk {
            source: 1,
            items: vec![SourceDescriptionItem {
                sdes_type: SdesType::SdesEnd,
                text: String::new(),
            }],
        }],
    };
    assert!(sdes.marshal().is_err());
}
