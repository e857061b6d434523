//! Driver vendor identification and known driver bugs.
//!
//! The workarounds themselves are not reproduced; the flags exist so the
//! backend can pick safer paths (e.g. `finish` instead of client waits) and
//! so bug reports carry the detected configuration.

use bitflags::bitflags;

use super::features::GlFeatureSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vendor {
    Amd,
    Nvidia,
    Intel,
    MesaSoft,
    Apple,
    Microsoft,
    ImgTec,
    Arm,
    Qualcomm,
    Broadcom,
    Vivante,
    Unknown,
}

const VENDOR_PATTERNS: &[(&[&str], Vendor)] = &[
    (&["ATI Technologies", "AMD", "Advanced Micro Devices"], Vendor::Amd),
    (&["NVIDIA"], Vendor::Nvidia),
    (&["Intel"], Vendor::Intel),
    (&["Mesa"], Vendor::MesaSoft),
    (&["Apple Computer", "Apple Inc."], Vendor::Apple),
    (&["Microsoft"], Vendor::Microsoft),
    (&["Imagination"], Vendor::ImgTec),
    (&["ARM"], Vendor::Arm),
    (&["Qualcomm"], Vendor::Qualcomm),
    (&["Broadcom"], Vendor::Broadcom),
    (&["Vivante"], Vendor::Vivante),
];

impl Vendor {
    /// Classifies a `GL_VENDOR` string. Order matters: the first match wins.
    pub fn detect(vendor: &str) -> Vendor {
        VENDOR_PATTERNS
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| vendor.contains(n)))
            .map(|(_, v)| *v)
            .unwrap_or(Vendor::Unknown)
    }

    pub fn name(self) -> &'static str {
        match self {
            Vendor::Amd => "AMD",
            Vendor::Nvidia => "NVIDIA",
            Vendor::Intel => "Intel",
            Vendor::MesaSoft => "Mesa",
            Vendor::Apple => "Apple",
            Vendor::Microsoft => "Microsoft",
            Vendor::ImgTec => "Imagination",
            Vendor::Arm => "ARM",
            Vendor::Qualcomm => "Qualcomm",
            Vendor::Broadcom => "Broadcom",
            Vendor::Vivante => "Vivante",
            Vendor::Unknown => "unknown",
        }
    }
}

bitflags! {
    /// Driver misbehaviour known for specific vendor and device combinations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DriverBugs: u16 {
        /// Claims ES 3.0 but implements it incorrectly.
        const BROKEN_GLES3 = 1 << 0;
        const CLEAR_REQUIRES_TEXTURE_STATE_UPDATE = 1 << 1;
        const GENERATE_MIPMAPS_REQUIRES_TEXTURE_ENABLE = 1 << 2;
        /// `glClientWaitSync` stalls far longer than the GPU work takes.
        const CLIENT_WAIT_SYNC_STALLS = 1 << 3;
        const BROKEN_SRGB = 1 << 4;
        const TEX_STORAGE_BREAKS_SUB_IMAGE = 1 << 5;
        /// R8 can't be sampled or rendered even though the version implies it.
        const BROKEN_R8_PIXEL_FORMAT = 1 << 6;
    }
}

impl DriverBugs {
    /// Flags that follow from the vendor and renderer strings alone.
    pub fn detect(vendor: Vendor, renderer: &str, features: &GlFeatureSet) -> DriverBugs {
        let mut bugs = DriverBugs::empty();

        if vendor == Vendor::Vivante
            && features.gles_at_least(3, 0)
            && !features.gles_at_least(3, 1)
            && renderer.contains("Vivante GC7000UL")
        {
            bugs |= DriverBugs::BROKEN_GLES3;
        }

        if vendor == Vendor::Amd {
            bugs |= DriverBugs::CLEAR_REQUIRES_TEXTURE_STATE_UPDATE;
            if !features.core_profile {
                bugs |= DriverBugs::GENERATE_MIPMAPS_REQUIRES_TEXTURE_ENABLE;
            }
            if renderer.contains("ATI Radeon") || renderer.contains("ATI Mobility Radeon") {
                bugs |= DriverBugs::TEX_STORAGE_BREAKS_SUB_IMAGE;
            }
        }

        if vendor == Vendor::Intel {
            if features.core_profile && (renderer.contains("HD Graphics 4000") || renderer.contains("HD Graphics 2500")) {
                bugs |= DriverBugs::CLIENT_WAIT_SYNC_STALLS;
            }
            if renderer.contains("HD Graphics 3000")
                || renderer.contains("HD Graphics 2000")
                || renderer == "Intel(R) HD Graphics"
                || renderer == "Intel(R) HD Graphics Family"
            {
                bugs |= DriverBugs::BROKEN_SRGB;
            }
        }

        bugs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_detection() {
        assert_eq!(Vendor::detect("ATI Technologies Inc."), Vendor::Amd);
        assert_eq!(Vendor::detect("NVIDIA Corporation"), Vendor::Nvidia);
        assert_eq!(Vendor::detect("Intel Open Source Technology Center"), Vendor::Intel);
        assert_eq!(Vendor::detect("Mesa/X.org"), Vendor::MesaSoft);
        assert_eq!(Vendor::detect("Apple Inc."), Vendor::Apple);
        assert_eq!(Vendor::detect("Totally New GPU Co"), Vendor::Unknown);
        assert_eq!(Vendor::detect(""), Vendor::Unknown);
    }

    #[test]
    fn test_intel_bugs() {
        let core = GlFeatureSet::desktop(4, 1);
        let bugs = DriverBugs::detect(Vendor::Intel, "Intel(R) HD Graphics 4000", &core);
        assert!(bugs.contains(DriverBugs::CLIENT_WAIT_SYNC_STALLS));
        assert!(!bugs.contains(DriverBugs::BROKEN_SRGB));

        let bugs = DriverBugs::detect(Vendor::Intel, "Intel(R) HD Graphics", &core);
        assert_eq!(bugs, DriverBugs::BROKEN_SRGB);
    }

    #[test]
    fn test_amd_and_vivante_bugs() {
        let compat = GlFeatureSet::desktop(3, 0);
        let bugs = DriverBugs::detect(Vendor::Amd, "ATI Radeon HD 5800", &compat);
        assert!(bugs.contains(DriverBugs::TEX_STORAGE_BREAKS_SUB_IMAGE));
        assert!(bugs.contains(DriverBugs::GENERATE_MIPMAPS_REQUIRES_TEXTURE_ENABLE));

        let es30 = GlFeatureSet::gles(3, 0);
        assert!(DriverBugs::detect(Vendor::Vivante, "Vivante GC7000UL", &es30).contains(DriverBugs::BROKEN_GLES3));
        assert!(DriverBugs::detect(Vendor::Nvidia, "GeForce GTX 1080", &compat).is_empty());
    }
}
