// tests/exclusivity_test.rs
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use se_stream::{
    ChaCha20Session, CipherDirection, CmacSession, CommandChannel, Error, GcmSession, KeyHandle,
    Result, SessionMode, SessionRegistry, SoftSecureElement,
};

#[test]
fn test_second_start_is_busy_in_every_mode() -> Result<()> {
    let channel = CommandChannel::new(SoftSecureElement::initialized());
    let aes = KeyHandle::aes(&[1u8; 16])?;
    let chacha = KeyHandle::chacha20(&[2u8; 32])?;

    let holder = CmacSession::begin(&channel, &aes)?;
    let owner = holder.session_id().unwrap();

    let busy = |result: Result<()>| match result {
        Err(Error::ChannelBusy { owner: o }) => assert_eq!(o, owner),
        other => panic!("expected ChannelBusy, got {:?}", other),
    };

    busy(CmacSession::begin(&channel, &aes).map(|_| ()));
    busy(GcmSession::begin_encrypt(&channel, &aes, &[0u8; 12], b"").map(|_| ()));
    busy(GcmSession::begin_decrypt(&channel, &aes, &[0u8; 12], b"").map(|_| ()));
    busy(ChaCha20Session::begin(&channel, &chacha, CipherDirection::Encrypt, &[0u8; 12]).map(|_| ()));
    busy(channel.cmac(&aes, b"one-shot").map(|_| ()));

    drop(holder);
    assert!(!channel.is_busy());
    Ok(())
}

#[test]
fn test_finish_and_abort_free_the_channel() -> Result<()> {
    let channel = CommandChannel::new(SoftSecureElement::initialized());
    let key = KeyHandle::aes(&[1u8; 16])?;

    let mut first = CmacSession::begin(&channel, &key)?;
    first.finish()?;
    let mut second = GcmSession::begin_encrypt(&channel, &key, &[0u8; 12], b"")?;
    second.abort()?;
    let mut third = CmacSession::begin(&channel, &key)?;
    third.finish()?;
    Ok(())
}

#[test]
fn test_failed_start_leaves_session_idle() -> Result<()> {
    let channel = CommandChannel::new(SoftSecureElement::initialized());
    let key = KeyHandle::aes(&[1u8; 16])?;
    let mut holder = CmacSession::begin(&channel, &key)?;

    let mut waiting = CmacSession::new(&channel, &key)?;
    assert!(matches!(waiting.start(), Err(Error::ChannelBusy { .. })));
    assert_eq!(waiting.phase(), se_stream::Phase::Idle);

    holder.finish()?;
    waiting.start()?;
    waiting.update(b"now it runs")?;
    waiting.finish()?;
    Ok(())
}

#[test]
fn test_concurrent_starts_admit_one() -> Result<()> {
    let channel = CommandChannel::new(SoftSecureElement::initialized());
    let key = KeyHandle::aes(&[7u8; 16])?;
    let threads = 8;
    let barrier = Barrier::new(threads);
    let admitted = AtomicUsize::new(0);
    let rejected = AtomicUsize::new(0);

    thread::scope(|scope| {
        for _ in 0..threads {
            scope.spawn(|| {
                barrier.wait();
                match CmacSession::begin(&channel, &key) {
                    Ok(session) => {
                        admitted.fetch_add(1, Ordering::SeqCst);
                        // Hold the channel until everyone has tried
                        barrier.wait();
                        drop(session);
                    }
                    Err(Error::ChannelBusy { .. }) => {
                        rejected.fetch_add(1, Ordering::SeqCst);
                        barrier.wait();
                    }
                    Err(e) => panic!("unexpected error: {}", e),
                }
            });
        }
    });

    assert_eq!(admitted.load(Ordering::SeqCst), 1);
    assert_eq!(rejected.load(Ordering::SeqCst), threads - 1);
    assert!(!channel.is_busy());
    Ok(())
}

#[test]
fn test_sessions_on_many_threads_take_turns() -> Result<()> {
    let channel = Arc::new(CommandChannel::new(SoftSecureElement::initialized()));
    let key = Arc::new(KeyHandle::aes(&[3u8; 32])?);
    let expected = channel.cmac(&key, b"shared message")?;

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let channel = Arc::clone(&channel);
            let key = Arc::clone(&key);
            thread::spawn(move || -> Result<()> {
                let mut done = 0;
                while done < 10 {
                    match CmacSession::begin(&channel, &key) {
                        Ok(mut session) => {
                            session.update(b"shared ")?;
                            session.update(b"message")?;
                            assert_eq!(session.finish()?, expected);
                            done += 1;
                        }
                        Err(Error::ChannelBusy { .. }) => thread::yield_now(),
                        Err(e) => return Err(e),
                    }
                }
                Ok(())
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker panicked")?;
    }
    assert!(!channel.is_busy());
    Ok(())
}

#[test]
fn test_registry_sees_open_sessions() -> Result<()> {
    let registry = Arc::new(SessionRegistry::new());
    let left = CommandChannel::with_registry(SoftSecureElement::initialized(), Arc::clone(&registry));
    let right = CommandChannel::with_registry(SoftSecureElement::initialized(), Arc::clone(&registry));
    let key = KeyHandle::aes(&[1u8; 16])?;

    let mut a = GcmSession::begin_encrypt(&left, &key, &[0u8; 12], b"")?;
    let b = CmacSession::begin(&right, &key)?;
    assert_eq!(registry.open_count(), 2);
    assert_eq!(registry.active(left.id()).unwrap().mode, SessionMode::GcmEncrypt);
    assert_eq!(registry.active(right.id()).unwrap().session_id, b.session_id().unwrap());

    a.finish()?;
    assert!(!registry.is_open(left.id()));
    drop(b);
    assert_eq!(registry.open_count(), 0);
    Ok(())
}
