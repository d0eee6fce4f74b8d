use dp_cc::{
    CcConfig, CmemRegion, CompletionRecord, DescType, Device, HwCookieConversion, PoolSizing,
    PptEntryWidth, PptWalker, SocCookieConversion,
};
use dp_host::{HostDmaAlloc, SimCmem};
use dp_info::cmem::{LUT_BASE_ADDR_39_32_CMEM, PPT_MEM_SIZE};

const CMEM_BASE: u64 = 0x0050_0000;

fn device(config: CcConfig) -> Device<SimCmem> {
    let mut cmem = CmemRegion::new(CMEM_BASE, PPT_MEM_SIZE);
    Device::new(config, SimCmem::new(CMEM_BASE, PPT_MEM_SIZE), &mut cmem).unwrap()
}

fn sizing() -> PoolSizing {
    PoolSizing {
        tx: [1536, 512, 0, 700],
        rx: [4096, 0, 1, 513],
        ppeds_tx: Some(2048),
    }
}

/// What the device would read through CMEM and DDR equals what the host
/// resolver returns, for every stamped cookie of every pool.
#[test]
fn host_resolver_matches_device_walk() {
    for width in [PptEntryWidth::Aligned4K, PptEntryWidth::Unaligned] {
        // 8-byte entries push the RX pools past a halved PPT
        if cfg!(feature = "single-pdev") && width == PptEntryWidth::Unaligned {
            continue;
        }
        let dev = device(
            CcConfig::default()
                .with_entry_width(width)
                .with_clear_ppt_on_deinit(true),
        );
        let mut dma = match width {
            PptEntryWidth::Aligned4K => HostDmaAlloc::new(),
            PptEntryWidth::Unaligned => HostDmaAlloc::new().with_phys_offset(0x88),
        };
        let mut soc = SocCookieConversion::new(&sizing()).unwrap();
        soc.attach(&dev, &mut dma, &sizing()).unwrap();
        soc.init(&dev).unwrap();

        let mapper = dma.mapper();
        let walker = PptWalker::new(&dev, &mapper);
        let mut all = Vec::new();
        for (n, cc) in (0u64..).zip(soc.pools()) {
            if cc.total_page_num() == 0 {
                continue;
            }
            let count = cc.total_page_num() as usize * 512;
            let addrs: Vec<u64> = (0..count as u64).map(|i| (n << 40) | (i << 6)).collect();
            let cookies = cc.stamp(&addrs).unwrap();
            all.extend(cookies.into_iter().zip(addrs));
        }

        for &(cookie, addr) in &all {
            let sw = dev.find(cookie);
            let hw = unsafe { walker.walk(cookie) };
            assert_eq!(sw, Some(addr));
            assert_eq!(sw, hw, "{width:?} cookie {cookie:#x}");
        }

        soc.deinit(&dev).unwrap();
        for &(cookie, _) in &all {
            assert_eq!(dev.find(cookie), None);
            assert_eq!(unsafe { walker.walk(cookie) }, None);
        }
        soc.detach(&dev, &mut dma).unwrap();
        assert_eq!(dma.outstanding(), 0);
        assert_eq!(dev.memory().stray_writes(), 0);
    }
}

#[test]
fn registers_describe_the_ppt() {
    let dev = device(CcConfig::default());
    let mut dma = HostDmaAlloc::new();
    let mut soc = SocCookieConversion::new(&sizing()).unwrap();
    soc.attach(&dev, &mut dma, &sizing()).unwrap();
    assert!(dev.memory().registers().is_none());

    soc.init(&dev).unwrap();
    let regs = dev.memory().registers().expect("registers programmed");
    assert_eq!(u64::from(regs.lut_base_addr_31_0), CMEM_BASE);
    assert_eq!(regs.lut_base_addr_39_32, LUT_BASE_ADDR_39_32_CMEM);
    assert!(regs.page_4k_align);
    assert!(!regs.wbm_enables.wbm2sw1());

    soc.deinit(&dev).unwrap();
    soc.detach(&dev, &mut dma).unwrap();
}

#[test]
fn registers_skipped_without_hw_conversion() {
    let dev = device(CcConfig::default().with_hw_cc_enabled(false));
    let mut dma = HostDmaAlloc::new();
    let mut soc = SocCookieConversion::new(&sizing()).unwrap();
    soc.attach(&dev, &mut dma, &sizing()).unwrap();
    soc.init(&dev).unwrap();
    assert!(dev.memory().registers().is_none());

    // completions then always take the software path
    let rx0 = soc.pool(DescType::RxBuf, 0).unwrap();
    let cookies = rx0.stamp(&[0xAB00, 0xCD00]).unwrap();
    let mut rec = CompletionRecord {
        cookie_convert_done: false,
        desc_va: 0,
        desc_id: cookies[1],
    };
    assert_eq!(dev.resolve_completion(&mut rec), Some(0xCD00));

    soc.deinit(&dev).unwrap();
    soc.detach(&dev, &mut dma).unwrap();
}

#[test]
fn converted_and_software_completions_agree() {
    let dev = device(CcConfig::default());
    let mut dma = HostDmaAlloc::new();
    let mut cc = HwCookieConversion::new(DescType::Tx, 1);
    cc.attach(&dev, &mut dma, 64).unwrap();
    cc.init(&dev).unwrap();
    let addrs: Vec<u64> = (0..64).map(|i| 0x7F00_0000_0000 + i * 0x100).collect();
    let cookies = cc.stamp(&addrs).unwrap();

    let mapper = dma.mapper();
    let walker = PptWalker::new(&dev, &mapper);
    for &cookie in &cookies {
        // the device fills desc_va from its own walk
        let converted = unsafe { walker.walk(cookie) }.unwrap();
        let mut hw = CompletionRecord {
            cookie_convert_done: true,
            desc_va: converted,
            desc_id: cookie,
        };
        let mut sw = CompletionRecord {
            cookie_convert_done: false,
            desc_va: 0,
            desc_id: cookie,
        };
        assert_eq!(dev.resolve_completion(&mut hw), dev.resolve_completion(&mut sw));
        // a replayed record is stale
        assert_eq!(dev.resolve_completion(&mut hw), None);
    }

    cc.deinit(&dev).unwrap();
    cc.detach(&dev, &mut dma).unwrap();
}
