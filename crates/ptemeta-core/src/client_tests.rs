use std::{cell::RefCell, collections::HashMap};

use crate::{
    ErrnoClassifier, Errno, ErrorKind, HeaderLayout, InlineMeta, InlineTag, Mdp, MetaClient,
    MetadataValue, OperationKind, PteMetaDriver, PteMetaError, StructuredMeta, Va,
};

///////////////////////////////////////////////////////////////////////////////
// Mock Driver
///////////////////////////////////////////////////////////////////////////////

/// Stores raw words and buffers per address without any lifecycle rules.
#[derive(Default)]
struct MockDriver {
    words: RefCell<HashMap<Va, u64>>,
    buffers: RefCell<HashMap<Va, Vec<u8>>>,
    fail_with: RefCell<Option<Errno>>,
}

impl MockDriver {
    fn fail_with(&self, errno: Errno) {
        *self.fail_with.borrow_mut() = Some(errno);
    }

    fn check(&self) -> Result<(), Errno> {
        match *self.fail_with.borrow() {
            Some(errno) => Err(errno),
            None => Ok(()),
        }
    }
}

impl PteMetaDriver for MockDriver {
    fn enable(&self, _va: Va) -> Result<(), Errno> {
        self.check()
    }

    fn disable(&self, _va: Va) -> Result<(), Errno> {
        self.check()
    }

    fn set_inline(&self, va: Va, word: u64) -> Result<(), Errno> {
        self.check()?;
        self.words.borrow_mut().insert(va, word);
        Ok(())
    }

    fn set_structured(&self, va: Va, buffer: &[u8]) -> Result<(), Errno> {
        self.check()?;
        self.buffers.borrow_mut().insert(va, buffer.to_vec());
        Ok(())
    }

    fn get_inline(&self, va: Va) -> Result<u64, Errno> {
        self.check()?;
        self.words.borrow().get(&va).copied().ok_or(Errno::ENODATA)
    }

    fn get_structured(&self, va: Va, buffer: &mut [u8]) -> Result<(), Errno> {
        self.check()?;
        let buffers = self.buffers.borrow();
        let stored = buffers.get(&va).ok_or(Errno::ENODATA)?;

        let len = stored.len().min(buffer.len());
        buffer[..len].copy_from_slice(&stored[..len]);
        Ok(())
    }
}

///////////////////////////////////////////////////////////////////////////////
// Test Helpers
///////////////////////////////////////////////////////////////////////////////

const VA: Va = Va(0x7f12_3456_7000);

const PAYLOAD: [u8; 16] = [
    0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE, 0xBA, 0xBE, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF,
];

fn make_client() -> MetaClient<MockDriver> {
    MetaClient::new(MockDriver::default())
}

///////////////////////////////////////////////////////////////////////////////
// Round Trips
///////////////////////////////////////////////////////////////////////////////

#[test]
fn inline_round_trip() -> Result<(), PteMetaError> {
    let client = make_client();
    let meta = InlineMeta::new(InlineTag::Pointer, 0xCAFE_BABE);

    assert_eq!(client.set_inline(VA, meta)?, Ok(()));
    assert_eq!(
        client.driver().words.borrow().get(&VA).copied(),
        Some(0x8000_0000_CAFE_BABE)
    );
    assert_eq!(client.get_inline(VA), Ok(meta));

    Ok(())
}

#[test]
fn structured_round_trip_for_each_layout() -> Result<(), PteMetaError> {
    for layout in [
        HeaderLayout::Compact,
        HeaderLayout::Wide,
        HeaderLayout::WideReserved,
    ] {
        let client = make_client().with_header_layout(layout);
        let value = MetadataValue::structured(1, 0x1234, PAYLOAD);

        assert_eq!(client.set(VA, &value)?, Ok(()));
        assert_eq!(
            client.driver().buffers.borrow()[&VA].len(),
            layout.header_len() + PAYLOAD.len()
        );
        assert_eq!(client.get(VA, Mdp::Structured, PAYLOAD.len())?, Ok(value));
    }

    Ok(())
}

#[test]
fn structured_read_with_wrong_length_is_a_codec_error() -> Result<(), PteMetaError> {
    let client = make_client();
    let meta = StructuredMeta::new(1, 0x1234, PAYLOAD);
    client.set_structured(VA, &meta)?;

    let result = client.get_structured(VA, PAYLOAD.len() - 4);
    assert!(matches!(result, Err(PteMetaError::Codec(_))));

    Ok(())
}

#[test]
fn unencodable_value_never_reaches_the_driver() {
    let client = make_client();
    let meta = InlineMeta::new(InlineTag::Scalar, 1 << 63);

    assert!(matches!(
        client.set_inline(VA, meta),
        Err(PteMetaError::Codec(_))
    ));
    assert!(client.driver().words.borrow().is_empty());
    assert!(client.stats().is_empty());
}

///////////////////////////////////////////////////////////////////////////////
// Classification
///////////////////////////////////////////////////////////////////////////////

#[test]
fn failures_are_classified() -> Result<(), PteMetaError> {
    let client = make_client();

    assert_eq!(client.get_inline(VA), Err(ErrorKind::NoData));

    client.driver().fail_with(Errno::EEXIST);
    assert_eq!(client.enable(VA), Err(ErrorKind::AlreadyExpanded));

    client.driver().fail_with(Errno::EINVAL);
    assert_eq!(client.disable(VA), Err(ErrorKind::NotExpanded));
    assert_eq!(
        client.set(VA, &MetadataValue::word(1))?,
        Err(ErrorKind::InvalidArgument)
    );

    client.driver().fail_with(Errno::EFAULT);
    assert_eq!(client.enable(VA), Err(ErrorKind::Other(Errno::EFAULT)));

    Ok(())
}

#[test]
fn custom_classifier() {
    let classifier = ErrnoClassifier::default().with_rule(
        Some(OperationKind::Get),
        Errno::ENOENT,
        ErrorKind::NoData,
    );
    let client = make_client().with_classifier(classifier);

    client.driver().fail_with(Errno::ENOENT);
    assert_eq!(client.get_inline(VA), Err(ErrorKind::NoData));
    assert_eq!(client.enable(VA), Err(ErrorKind::NotExpanded));
}

///////////////////////////////////////////////////////////////////////////////
// Timing
///////////////////////////////////////////////////////////////////////////////

#[test]
fn every_call_is_timed() -> Result<(), PteMetaError> {
    let client = make_client();

    client.enable(VA).ok();
    client.set(VA, &MetadataValue::word(7))?.ok();
    client.get_inline(VA).ok();
    client.get_inline(Va(0x1000)).ok();
    client.disable(VA).ok();

    let stats = client.stats();
    assert_eq!(
        stats.names().collect::<Vec<_>>(),
        [
            "enable_pte_meta",
            "set_pte_meta mdp=0",
            "get_pte_meta mdp=0",
            "disable_pte_meta"
        ]
    );
    // The failed get is timed as well.
    assert_eq!(stats.samples("get_pte_meta mdp=0").len(), 2);

    Ok(())
}

#[test]
fn take_stats_leaves_collector_empty() {
    let client = make_client();
    client.enable(VA).ok();

    let stats = client.take_stats();
    assert_eq!(stats.samples("enable_pte_meta").len(), 1);
    assert!(client.stats().is_empty());
}
