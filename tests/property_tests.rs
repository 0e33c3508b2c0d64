use se_stream::{
    ChunkPlanner, CmacSession, CommandChannel, Error, GcmSession, KeyHandle, SoftSecureElement,
    StreamConfig, decrypt_verified,
};

use proptest::prelude::*;

// Strategy for generating message bodies
fn messages() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..700)
}

// Strategy for generating update-size partitions
fn cut_points() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(1usize..200, 0..12)
}

// Strategy for generating AES keys of every length
fn aes_keys() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 16),
        prop::collection::vec(any::<u8>(), 24),
        prop::collection::vec(any::<u8>(), 32),
    ]
}

/// Split `data` at the running sums of `cuts`, the rest going in a final part
fn partition<'a>(data: &'a [u8], cuts: &[usize]) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    let mut rest = data;
    for &cut in cuts {
        let take = cut.min(rest.len());
        let (head, tail) = rest.split_at(take);
        parts.push(head);
        rest = tail;
    }
    parts.push(rest);
    parts
}

fn gcm_encrypt(
    channel: &CommandChannel<SoftSecureElement>,
    key: &KeyHandle,
    iv: &[u8],
    ad: &[u8],
    parts: &[&[u8]],
    config: StreamConfig,
) -> (Vec<u8>, Vec<u8>) {
    let mut session = GcmSession::with_config(
        channel,
        key,
        se_stream::CipherDirection::Encrypt,
        iv,
        ad,
        config,
    )
    .unwrap();
    session.start().unwrap();
    let mut out = Vec::new();
    for part in parts {
        out.extend(session.update(part).unwrap());
    }
    let (tail, tag) = session.finish().unwrap();
    out.extend(tail);
    (out, tag)
}

proptest! {
    #[test]
    fn test_planner_walk_sums_to_total(total in 0usize..5000, capacity in 1usize..600) {
        let planner = ChunkPlanner::new(total, capacity).unwrap();
        let chunks: Vec<_> = planner.chunks().collect();

        prop_assert_eq!(chunks.iter().map(|c| c.length).sum::<usize>(), total);
        prop_assert_eq!(chunks.len(), planner.chunk_count());

        let mut expected_offset = 0;
        for (i, chunk) in chunks.iter().enumerate() {
            prop_assert_eq!(chunk.offset_in, expected_offset);
            prop_assert_eq!(chunk.offset_out, expected_offset);
            prop_assert!(chunk.length <= capacity);
            if total > 0 {
                prop_assert!(chunk.length > 0);
            }
            if i + 1 < chunks.len() {
                prop_assert_eq!(chunk.length, capacity);
            }
            expected_offset += chunk.length;
        }
    }

    #[test]
    fn test_gcm_chunk_invariance(
        key in aes_keys(),
        iv in prop::collection::vec(any::<u8>(), 12),
        ad in prop::collection::vec(any::<u8>(), 0..40),
        message in messages(),
        cuts in cut_points(),
    ) {
        let channel = CommandChannel::new(SoftSecureElement::initialized());
        let key = KeyHandle::aes(&key).unwrap();

        let whole = gcm_encrypt(&channel, &key, &iv, &ad, &[message.as_slice()], StreamConfig::default());
        let split = gcm_encrypt(&channel, &key, &iv, &ad, &partition(&message, &cuts), StreamConfig::embedded());
        let bytewise: Vec<&[u8]> = message.chunks(1).collect();
        let tiny = gcm_encrypt(&channel, &key, &iv, &ad, &bytewise, StreamConfig::default());

        prop_assert_eq!(&whole, &split);
        prop_assert_eq!(&whole, &tiny);
    }

    #[test]
    fn test_gcm_round_trip(
        key in aes_keys(),
        iv in prop::collection::vec(any::<u8>(), 12),
        ad in prop::collection::vec(any::<u8>(), 0..40),
        message in messages(),
        tag_length in 4usize..=16,
    ) {
        let channel = CommandChannel::new(SoftSecureElement::initialized());
        let key = KeyHandle::aes(&key).unwrap();
        let config = StreamConfig::default().with_tag_length(tag_length);

        let (ciphertext, tag) = gcm_encrypt(&channel, &key, &iv, &ad, &[message.as_slice()], config);
        prop_assert_eq!(tag.len(), tag_length);

        let plaintext = decrypt_verified(&channel, &key, &iv, &ad, &ciphertext, &tag, config).unwrap();
        prop_assert_eq!(plaintext, message);
    }

    #[test]
    fn test_gcm_single_bit_flip_is_rejected(
        message in prop::collection::vec(any::<u8>(), 1..300),
        ad in prop::collection::vec(any::<u8>(), 1..40),
        target in 0usize..4,
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let channel = CommandChannel::new(SoftSecureElement::initialized());
        let key = KeyHandle::aes(&[0x5Cu8; 16]).unwrap();
        let mut iv = vec![0xA7u8; 12];
        let mut ad = ad;
        let config = StreamConfig::default();

        let (mut ciphertext, mut tag) = gcm_encrypt(&channel, &key, &iv, &ad, &[message.as_slice()], config);
        let flip = 1u8 << bit;
        match target {
            0 => { let i = position.index(ciphertext.len()); ciphertext[i] ^= flip; }
            1 => { let i = position.index(tag.len()); tag[i] ^= flip; }
            2 => { let i = position.index(iv.len()); iv[i] ^= flip; }
            _ => { let i = position.index(ad.len()); ad[i] ^= flip; }
        }

        let result = decrypt_verified(&channel, &key, &iv, &ad, &ciphertext, &tag, config);
        prop_assert!(matches!(result, Err(Error::TagMismatch)));
        prop_assert!(!channel.is_busy());
    }

    #[test]
    fn test_cmac_chunk_invariance(message in messages(), cuts in cut_points()) {
        let channel = CommandChannel::new(SoftSecureElement::initialized());
        let key = KeyHandle::aes(&[0x2Bu8; 16]).unwrap();

        let mut session = CmacSession::begin(&channel, &key).unwrap();
        for part in partition(&message, &cuts) {
            session.update(part).unwrap();
        }
        let streamed = session.finish().unwrap();

        prop_assert_eq!(streamed, channel.cmac(&key, &message).unwrap());
    }
}
