use serde::Serialize;

/// One quality tier of the output stream. The catalog is fixed for the
/// whole process; profiles are never built at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RenditionProfile {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
    pub bitrate_kbps: u32,
}

impl RenditionProfile {
    /// Nominal bandwidth advertised in the master playlist, in bits/s.
    pub fn bandwidth_bps(&self) -> u64 {
        u64::from(self.bitrate_kbps) * 1000
    }

    pub fn resolution(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

pub const RENDITION_CATALOG: [RenditionProfile; 3] = [
    RenditionProfile {
        name: "480p",
        width: 854,
        height: 480,
        bitrate_kbps: 1400,
    },
    RenditionProfile {
        name: "720p",
        width: 1280,
        height: 720,
        bitrate_kbps: 2500,
    },
    RenditionProfile {
        name: "1080p",
        width: 1920,
        height: 1080,
        bitrate_kbps: 5000,
    },
];

/// Returns the catalog profiles that do not upscale the source, in
/// catalog order (ascending quality). An empty ladder is the caller's
/// problem; nothing here treats it as an error.
pub fn select_ladder(source_height: u32) -> Vec<RenditionProfile> {
    RENDITION_CATALOG
        .iter()
        .copied()
        .filter(|profile| profile.height <= source_height)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_is_ascending_by_quality() {
        for pair in RENDITION_CATALOG.windows(2) {
            assert!(pair[0].height < pair[1].height);
            assert!(pair[0].bitrate_kbps < pair[1].bitrate_kbps);
        }
    }

    #[test]
    fn full_hd_source_selects_whole_catalog() {
        let ladder = select_ladder(1080);
        let names: Vec<&str> = ladder.iter().map(|p| p.name).collect();
        assert_eq!(names, ["480p", "720p", "1080p"]);
    }

    #[test]
    fn sd_source_selects_lowest_tier_only() {
        let ladder = select_ladder(600);
        let names: Vec<&str> = ladder.iter().map(|p| p.name).collect();
        assert_eq!(names, ["480p"]);
    }

    #[test]
    fn source_below_catalog_selects_nothing() {
        assert!(select_ladder(360).is_empty());
        assert!(select_ladder(0).is_empty());
    }

    #[test]
    fn selection_is_idempotent() {
        for height in [0, 360, 480, 600, 720, 1080, 2160] {
            assert_eq!(select_ladder(height), select_ladder(height));
        }
    }

    #[test]
    fn selection_never_upscales() {
        for height in 0..2200 {
            assert!(select_ladder(height)
                .iter()
                .all(|profile| profile.height <= height));
        }
    }

    #[test]
    fn bandwidth_is_bitrate_times_thousand() {
        assert_eq!(RENDITION_CATALOG[0].bandwidth_bps(), 1_400_000);
        assert_eq!(RENDITION_CATALOG[2].bandwidth_bps(), 5_000_000);
    }
}
