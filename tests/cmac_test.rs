// tests/cmac_test.rs
use se_stream::{
    AlgorithmFamily, CmacSession, CommandChannel, Error, KeyHandle, Phase, Result, SoftSecureElement,
    StreamConfig,
};

fn rfc4493_key() -> Result<KeyHandle> {
    KeyHandle::aes(&hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap())
}

#[test]
fn test_rfc4493_vectors() -> Result<()> {
    let channel = CommandChannel::new(SoftSecureElement::initialized());
    let key = rfc4493_key()?;

    // Example 1: empty message, no updates at all
    let mut session = CmacSession::begin(&channel, &key)?;
    let tag = session.finish()?;
    assert_eq!(hex::encode(tag), "bb1d6929e95937287fa37d129b756746");

    // Example 2: one block, split across two updates
    let message = hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap();
    let mut session = CmacSession::begin(&channel, &key)?;
    session.update(&message[..5])?;
    session.update(&message[5..])?;
    assert_eq!(hex::encode(session.finish()?), "070a16b46b4d4144f79bdd9dd04a287c");

    Ok(())
}

#[test]
fn test_zero_updates_equals_empty_message() -> Result<()> {
    let channel = CommandChannel::new(SoftSecureElement::initialized());
    let key = KeyHandle::aes(&[0x5Au8; 32])?;

    let mut session = CmacSession::begin(&channel, &key)?;
    let no_updates = session.finish()?;

    let mut session = CmacSession::begin(&channel, &key)?;
    session.update(&[])?;
    let empty_update = session.finish()?;

    assert_eq!(no_updates, channel.cmac(&key, &[])?);
    assert_eq!(no_updates, empty_update);
    Ok(())
}

#[test]
fn test_chunk_capacity_does_not_change_tag() -> Result<()> {
    let channel = CommandChannel::new(SoftSecureElement::initialized());
    let key = KeyHandle::aes(&[0x01u8; 24])?;
    assert_eq!(key.algorithm_family(), AlgorithmFamily::Aes192);
    let message: Vec<u8> = (0..3000u32).map(|i| (i * 7) as u8).collect();

    let mut tags = Vec::new();
    for config in [StreamConfig::embedded(), StreamConfig::default(), StreamConfig::high_throughput()] {
        let mut session = CmacSession::with_config(&channel, &key, config)?;
        session.start()?;
        for part in message.chunks(333) {
            session.update(part)?;
        }
        tags.push(session.finish()?);
    }

    assert!(tags.windows(2).all(|w| w[0] == w[1]));
    Ok(())
}

#[test]
fn test_ordering_violations() -> Result<()> {
    let channel = CommandChannel::new(SoftSecureElement::initialized());
    let key = KeyHandle::aes(&[0u8; 16])?;

    let mut session = CmacSession::new(&channel, &key)?;
    assert_eq!(session.phase(), Phase::Idle);
    assert!(matches!(session.update(b"early"), Err(Error::InvalidSequence { .. })));
    assert!(matches!(session.finish(), Err(Error::InvalidSequence { .. })));

    session.start()?;
    assert!(matches!(session.start(), Err(Error::InvalidSequence { .. })));
    session.update(b"data")?;
    assert_eq!(session.phase(), Phase::Updated);
    session.finish()?;

    match session.update(b"late") {
        Err(Error::InvalidSequence { actual, .. }) => assert_eq!(actual, Phase::Finished),
        other => panic!("expected InvalidSequence, got {:?}", other),
    }
    assert!(matches!(session.finish(), Err(Error::InvalidSequence { .. })));
    assert!(matches!(session.abort(), Err(Error::InvalidSequence { .. })));
    Ok(())
}

#[test]
fn test_abort_poisons_session() -> Result<()> {
    let channel = CommandChannel::new(SoftSecureElement::initialized());
    let key = KeyHandle::aes(&[0u8; 16])?;

    let mut session = CmacSession::begin(&channel, &key)?;
    session.update(b"partial")?;
    session.abort()?;

    assert_eq!(session.phase(), Phase::Aborted);
    assert!(!channel.is_busy());
    assert!(matches!(session.update(b"more"), Err(Error::InvalidSequence { .. })));
    assert!(matches!(session.finish(), Err(Error::InvalidSequence { .. })));
    Ok(())
}
