use dp_cc::{
    CcConfig, CcError, CcState, CmemClient, CmemRegion, DescType, Device, DeviceMemory,
    HwCookieConversion, PptEntryWidth, decode, encode,
};
use dp_host::{HostDmaAlloc, SimCmem};
use dp_info::SPT_PAGE_MAX_ENTRIES;
use dp_info::cmem::{FST_MEM_SIZE, PPT_MEM_SIZE};

const CMEM_BASE: u64 = 0x0030_0000;
const CMEM_SIZE: u64 = PPT_MEM_SIZE + FST_MEM_SIZE;

fn device(config: CcConfig) -> Device<SimCmem> {
    let mut cmem = CmemRegion::new(CMEM_BASE, CMEM_SIZE);
    let dev = Device::new(config, SimCmem::new(CMEM_BASE, CMEM_SIZE), &mut cmem).unwrap();
    let fst = cmem.reserve(CmemClient::FlowSearchTable).unwrap();
    assert_eq!(fst.base, CMEM_BASE + PPT_MEM_SIZE);
    assert_eq!(cmem.avail_size(), 0);
    dev
}

#[test]
fn codec_round_trips_every_valid_cookie() {
    for p in 0..=dp_cc::cookie::MAX_PPT_INDEX {
        for s in 0..SPT_PAGE_MAX_ENTRIES {
            assert_eq!(decode(encode(p, s)), (p, s));
        }
    }
}

#[test]
fn two_pages_for_1024_descriptors() {
    let dev = device(CcConfig::default());
    let mut dma = HostDmaAlloc::new();
    let mut cc = HwCookieConversion::new(DescType::Tx, 0);

    cc.attach(&dev, &mut dma, 1024).unwrap();
    assert_eq!(cc.total_page_num(), 2);
    assert_eq!(dma.outstanding(), 2);
    cc.detach(&dev, &mut dma).unwrap();
}

#[test]
fn request_beyond_capacity_is_capped() {
    let dev = device(CcConfig::default());
    let max = dev.max_ppt_entries();
    let mut dma = HostDmaAlloc::new();
    let mut cc = HwCookieConversion::new(DescType::Tx, 0);

    cc.attach(&dev, &mut dma, (max + 1) * SPT_PAGE_MAX_ENTRIES + 1)
        .unwrap();
    assert_eq!(cc.total_page_num(), max);
    cc.detach(&dev, &mut dma).unwrap();
    assert_eq!(dma.outstanding(), 0);
}

#[test]
fn unaligned_page_is_rejected_and_nothing_leaks() {
    let dev = device(CcConfig::default());
    let mut dma = HostDmaAlloc::new().with_phys_offset(0x100);
    let mut cc = HwCookieConversion::new(DescType::RxBuf, 0);

    let err = cc.attach(&dev, &mut dma, 2048).unwrap_err();
    assert!(matches!(err, CcError::InvalidAlignment { page: 0, .. }));
    assert_eq!(dma.outstanding(), 0);
    assert_eq!(cc.state(), CcState::Unattached);
    assert_eq!(dev.attached_pools(), 0);
}

#[test]
fn exhausted_allocator_is_reported_and_recoverable() {
    let dev = device(CcConfig::default());
    let mut dma = HostDmaAlloc::new().with_page_limit(1);
    let mut cc = HwCookieConversion::new(DescType::RxBuf, 0);

    assert!(matches!(
        cc.attach(&dev, &mut dma, 1024),
        Err(CcError::ResourceExhausted { .. })
    ));
    assert_eq!(dma.outstanding(), 0);

    dma.set_page_limit(None);
    cc.attach(&dev, &mut dma, 1024).unwrap();
    cc.detach(&dev, &mut dma).unwrap();
}

#[test]
fn table_follows_init_and_deinit() {
    let dev = device(CcConfig::default());
    let mut dma = HostDmaAlloc::new();
    let mut cc = HwCookieConversion::new(DescType::RxBuf, 1);
    cc.attach(&dev, &mut dma, 3 * 512).unwrap();

    for desc in cc.page_descs() {
        assert!(dev.table().lookup(desc.ppt_index).is_none());
    }

    cc.init(&dev).unwrap();
    let range = cc.ppt_range();
    for (ppt, desc) in range.clone().zip(cc.page_descs()) {
        assert_eq!(desc.ppt_index, ppt);
        assert_eq!(dev.table().lookup(ppt), Some(desc.page_v_addr));
    }

    let cookie = encode(range.start + 2, 511);
    cc.update_slot(cookie, 0xDEAD_BEEF_0000_0040).unwrap();
    assert_eq!(dev.find(cookie), Some(0xDEAD_BEEF_0000_0040));

    cc.deinit(&dev).unwrap();
    for ppt in range {
        assert!(dev.table().lookup(ppt).is_none());
    }
    assert_eq!(dev.find(cookie), None);
    assert_eq!(dev.memory().stray_writes(), 0);

    cc.detach(&dev, &mut dma).unwrap();
}

#[test]
fn written_descriptor_resolves_from_its_cookie() {
    let dev = device(CcConfig::default());
    let mut dma = HostDmaAlloc::new();
    let mut cc = HwCookieConversion::new(DescType::Tx, 2);
    cc.attach(&dev, &mut dma, 2000).unwrap();
    cc.init(&dev).unwrap();

    // host descriptors whose addresses the slots will hold
    let descs: Vec<Box<[u8; 64]>> = (0..2000).map(|_| Box::new([0u8; 64])).collect();
    let addrs: Vec<u64> = descs
        .iter()
        .map(|d| d.as_ptr().expose_provenance() as u64)
        .collect();

    let cookies = cc.stamp(&addrs).unwrap();
    for (cookie, addr) in cookies.iter().zip(&addrs) {
        assert_eq!(dev.find(*cookie), Some(*addr));
    }

    cc.deinit(&dev).unwrap();
    cc.detach(&dev, &mut dma).unwrap();
}

#[test]
fn pools_on_one_device_get_disjoint_ranges() {
    let dev = device(CcConfig::default());
    let mut dma = HostDmaAlloc::new();

    let mut pools = vec![
        HwCookieConversion::new(DescType::PpedsTx, 0),
        HwCookieConversion::new(DescType::Tx, 0),
        HwCookieConversion::new(DescType::Tx, 1),
        HwCookieConversion::new(DescType::RxBuf, 0),
        HwCookieConversion::new(DescType::RxBuf, 3),
    ];
    for cc in &mut pools {
        cc.attach(&dev, &mut dma, 4 * 512).unwrap();
        cc.init(&dev).unwrap();
    }

    for (i, a) in pools.iter().enumerate() {
        for b in &pools[i + 1..] {
            let (ra, rb) = (a.ppt_range(), b.ppt_range());
            assert!(ra.end <= rb.start || rb.end <= ra.start, "{ra:?} vs {rb:?}");
        }
    }
    assert_eq!(dev.table().published(), 5 * 4);
    assert_eq!(dev.table().claimed_pools(), 5);

    for cc in &mut pools {
        cc.deinit(&dev).unwrap();
        cc.detach(&dev, &mut dma).unwrap();
    }
    assert_eq!(dma.outstanding(), 0);
}

#[test]
fn pool_spilling_into_its_neighbour_is_fatal() {
    let dev = device(CcConfig::default());
    let mut dma = HostDmaAlloc::new();

    let mut rx1 = HwCookieConversion::new(DescType::RxBuf, 1);
    rx1.attach(&dev, &mut dma, 512).unwrap();
    rx1.init(&dev).unwrap();

    // an RX pool owns 32 entries; 40 pages run into RX pool 1
    let mut rx0 = HwCookieConversion::new(DescType::RxBuf, 0);
    rx0.attach(&dev, &mut dma, 40 * 512).unwrap();
    let writes_before = dev.memory().writes();
    assert!(matches!(
        rx0.init(&dev),
        Err(CcError::ConfigurationOverflow { .. })
    ));
    assert_eq!(dev.memory().writes(), writes_before);
    assert!(dev.is_poisoned());

    let mut late = HwCookieConversion::new(DescType::Tx, 0);
    assert_eq!(late.attach(&dev, &mut dma, 1), Err(CcError::Poisoned));

    // the healthy pool keeps resolving and can be torn down
    let cookie = encode(rx1.ppt_range().start, 0);
    rx1.update_slot(cookie, 77).unwrap();
    assert_eq!(dev.find(cookie), Some(77));
    rx1.deinit(&dev).unwrap();
    rx1.detach(&dev, &mut dma).unwrap();
    rx0.detach(&dev, &mut dma).unwrap();
    assert_eq!(dma.outstanding(), 0);
}

#[test]
fn devices_are_independent() {
    let dev_a = device(CcConfig::default());
    let dev_b = device(CcConfig::default().with_chip_id(if dp_info::pools::MAX_CHIPS > 1 {
        1
    } else {
        0
    }));
    let mut dma = HostDmaAlloc::new();

    let mut a = HwCookieConversion::new(DescType::Tx, 0);
    let mut b = HwCookieConversion::new(DescType::Tx, 0);
    a.attach(&dev_a, &mut dma, 512).unwrap();
    b.attach(&dev_b, &mut dma, 512).unwrap();
    a.init(&dev_a).unwrap();
    b.init(&dev_b).unwrap();

    // same PPT range on both devices, different pages behind it
    assert_eq!(a.ppt_range(), b.ppt_range());
    let cookie = encode(a.ppt_range().start, 5);
    a.update_slot(cookie, 0xAAAA).unwrap();
    b.update_slot(cookie, 0xBBBB).unwrap();
    assert_eq!(dev_a.find(cookie), Some(0xAAAA));
    assert_eq!(dev_b.find(cookie), Some(0xBBBB));

    a.deinit(&dev_a).unwrap();
    assert_eq!(dev_a.find(cookie), None);
    assert_eq!(dev_b.find(cookie), Some(0xBBBB));

    b.deinit(&dev_b).unwrap();
    a.detach(&dev_a, &mut dma).unwrap();
    b.detach(&dev_b, &mut dma).unwrap();
}

#[test]
fn reattach_reproduces_the_same_layout() {
    let dev = device(CcConfig::default());
    let mut dma = HostDmaAlloc::new();
    let mut cc = HwCookieConversion::new(DescType::RxBuf, 2);

    let mut run = |cc: &mut HwCookieConversion| {
        cc.attach(&dev, &mut dma, 1500).unwrap();
        cc.init(&dev).unwrap();
        let cookies = cc.stamp(&vec![1u64; 1500]).unwrap();
        let range = cc.ppt_range();
        for d in cc.page_descs() {
            let word = dev.memory().cmem_read(dev.ppt_entry_offset(d.ppt_index));
            assert_eq!(u64::from(word) << 12, d.page_p_addr.as_u64());
        }
        let cmem = dev.memory().snapshot();
        cc.deinit(&dev).unwrap();
        cc.detach(&dev, &mut dma).unwrap();
        (cookies, range, cmem)
    };

    let first = run(&mut cc);
    let second = run(&mut cc);
    assert_eq!(first, second);
    assert!(first.2.iter().any(|&w| w != 0));
    assert_eq!(dma.outstanding(), 0);
}

#[test]
fn entry_width_is_fixed_while_pools_are_attached() {
    let mut dev = device(CcConfig::default());
    let mut dma = HostDmaAlloc::new();
    let mut cc = HwCookieConversion::new(DescType::Tx, 0);

    cc.attach(&dev, &mut dma, 512).unwrap();
    assert!(matches!(
        dev.set_entry_width(PptEntryWidth::Unaligned),
        Err(CcError::InvalidState { op: "set_entry_width", .. })
    ));
    cc.detach(&dev, &mut dma).unwrap();

    dev.set_entry_width(PptEntryWidth::Unaligned).unwrap();
    assert_eq!(dev.max_ppt_entries(), PptEntryWidth::Unaligned.max_entries());

    // unaligned pages are now acceptable
    let mut dma = HostDmaAlloc::new().with_phys_offset(0x48);
    cc.attach(&dev, &mut dma, 512).unwrap();
    cc.init(&dev).unwrap();
    let cookie = encode(cc.ppt_range().start, 1);
    cc.update_slot(cookie, 9).unwrap();
    assert_eq!(dev.find(cookie), Some(9));
    cc.deinit(&dev).unwrap();
    cc.detach(&dev, &mut dma).unwrap();
}

#[test]
fn teardown_through_another_device_is_refused() {
    let dev_a = device(CcConfig::default());
    let dev_b = device(CcConfig::default());
    let mut dma = HostDmaAlloc::new();
    let mut cc = HwCookieConversion::new(DescType::Tx, 2);

    cc.attach(&dev_a, &mut dma, 512).unwrap();
    cc.init(&dev_a).unwrap();
    let cookie = encode(cc.ppt_range().start, 7);
    cc.update_slot(cookie, 0xD00D).unwrap();

    assert!(matches!(
        cc.deinit(&dev_b),
        Err(CcError::InvalidState { op: "deinit", .. })
    ));
    assert!(matches!(
        cc.detach(&dev_b, &mut dma),
        Err(CcError::InvalidState { op: "detach", .. })
    ));
    assert_eq!(dma.outstanding(), 1);
    assert_eq!(dev_b.attached_pools(), 0);
    assert_eq!(dev_a.find(cookie), Some(0xD00D));

    cc.deinit(&dev_a).unwrap();
    cc.detach(&dev_a, &mut dma).unwrap();
    assert_eq!(dma.outstanding(), 0);
    assert_eq!(dev_a.attached_pools(), 0);
}
