//! Fixed parameters of the 24-cell sponge permutation: the external and
//! internal round constants and the internal diagonal multipliers. The
//! external mixing layer is built from the 4x4 local matrix in
//! `poseidon.rs`; everything here is data.

/// Cells in the sponge state.
pub const CELLS: usize = 24;

/// External (full) rounds, split evenly around the internal rounds.
pub const ROUNDS_FULL: usize = 8;

/// Internal (partial) rounds.
pub const ROUNDS_PARTIAL: usize = 21;

/// Total rounds of one permutation.
pub const ROUNDS_TOTAL: usize = ROUNDS_FULL + ROUNDS_PARTIAL;

/// Round constants for the external rounds, one row per round.
#[rustfmt::skip]
pub const EXTERNAL_ROUND_CONSTANTS: [[u32; CELLS]; ROUNDS_FULL] = [
    [
    0x1D9A2784, 0x03AACD04, 0x70B2B708, 0x09B7FF08, 0x3C5BA267, 0x20586380,
    0x108CFF2B, 0x2AB71A65, 0x1D46F6C1, 0x0CEDE34B, 0x2B0364E0, 0x0913A5E1,
    0x37A29D1E, 0x58BCD917, 0x5F186995, 0x35D0A824, 0x2232C58B, 0x04F13505,
    0x554C9F19, 0x1808C2DD, 0x203F20EA, 0x26E816CC, 0x65F9F8CC, 0x0A2AE024,
    ],
    [
    0x73209F5F, 0x53A32972, 0x2B912FEF, 0x328587AE, 0x557C3AE3, 0x07EAE604,
    0x01FDCC37, 0x3FBC6F1C, 0x7140ECC2, 0x55CE5A70, 0x0F554068, 0x06EBCCDE,
    0x545717C5, 0x14E8D93A, 0x1F4B3CAB, 0x65988D05, 0x72AAF3FA, 0x4A82B894,
    0x72483836, 0x45A6468A, 0x6B9D3DA1, 0x2C467930, 0x26AB4F9A, 0x0BBEE1EC,
    ],
    [
    0x4DA7658B, 0x772F221B, 0x11A069A1, 0x4468054B, 0x2F95A2DE, 0x420097D8,
    0x3B9BE0E8, 0x180BAE4E, 0x697B4BB0, 0x346E63B1, 0x51244ED8, 0x272EEAEF,
    0x3969411D, 0x0DB89FE8, 0x7709A445, 0x076438CB, 0x3F4A9A86, 0x3D6A1BD7,
    0x69801607, 0x397358DD, 0x5EB59063, 0x4B27BED9, 0x5CDC458A, 0x72079CFA,
    ],
    [
    0x0D273250, 0x42805580, 0x4CAD3813, 0x02F45BDB, 0x0CC76F50, 0x0065ACDE,
    0x398080DA, 0x75D1134F, 0x713139B0, 0x5E3F208F, 0x48F2C3BC, 0x0F61089C,
    0x6F677A7E, 0x668945A3, 0x38A7EEEB, 0x10D8D184, 0x6672F5E6, 0x6B80FC82,
    0x5587EBE7, 0x7388040A, 0x36919669, 0x2E5FDE2F, 0x0C960A20, 0x49D9B002,
    ],
    [
    0x60B95BBB, 0x5ED77ED6, 0x34DF9907, 0x344C2531, 0x265987E1, 0x0E799FF0,
    0x397BA4B0, 0x4C0F4D05, 0x3340B8D0, 0x20468CF2, 0x619689AE, 0x27B05B42,
    0x29C3F151, 0x2D69D95A, 0x547D84E7, 0x30ABEBFB, 0x5D6ADD5D, 0x66172917,
    0x164F3AE4, 0x0214509E, 0x19A0790A, 0x4B17E67F, 0x103CDA54, 0x1BDB19EE,
    ],
    [
    0x3CB3AABD, 0x3347259A, 0x301A8B6D, 0x50BAB295, 0x2326BC57, 0x11A99C19,
    0x715E172E, 0x1A62AA5F, 0x58DF8474, 0x6DD6BA5B, 0x1935C519, 0x1EE5FE60,
    0x738C893B, 0x011B50D8, 0x3F281F43, 0x04CB5AE5, 0x2074FC71, 0x3854B78C,
    0x63EE63D6, 0x3670E9D5, 0x5B32D777, 0x08176FC8, 0x5DED2997, 0x59F4F5F0,
    ],
    [
    0x39A34B57, 0x1D5C263C, 0x3CA836D8, 0x37E22EEF, 0x23FBCD51, 0x59EFFA88,
    0x01ADB235, 0x08C0A04E, 0x5A1A8BF2, 0x03540711, 0x4BD4A1F1, 0x439008C6,
    0x037CCF75, 0x311B1985, 0x3A6F9AA0, 0x392275A1, 0x712B6D91, 0x61486832,
    0x026A47BC, 0x37759AF5, 0x099A1041, 0x642A3E11, 0x44B09B60, 0x2333E6FA,
    ],
    [
    0x31126C8F, 0x356D3971, 0x27851BEE, 0x0B6574CC, 0x2C355688, 0x6F5909B3,
    0x381343D5, 0x2DF48CF7, 0x21EDF6BB, 0x47614B77, 0x679F00B8, 0x31C57728,
    0x0AAC2BB0, 0x3EE3B1CD, 0x3A51A0F8, 0x4179ABB5, 0x2C0FE859, 0x3C04EBCE,
    0x27252843, 0x1856A3A7, 0x4F1FCF81, 0x00157850, 0x0085529D, 0x1731E29C,
    ],
];

/// Round constants for the internal rounds, applied to cell 0 only.
#[rustfmt::skip]
pub const INTERNAL_ROUND_CONSTANTS: [u32; ROUNDS_PARTIAL] = [
    0x0F793757, 0x0D75E388, 0x183CC663, 0x0EFBEDBE, 0x6D1682CF, 0x57235BE2,
    0x043F97CB, 0x726875D6, 0x04B3F939, 0x29FFFE0D, 0x0B9E5030, 0x18BF41BC,
    0x3FAA1002, 0x3C101BF6, 0x00C7436C, 0x293FFE75, 0x0E3F215B, 0x4F34DCE2,
    0x00976107, 0x0348A7FD, 0x506FBF35,
];

/// Per-cell diagonal multipliers of the internal linear layer.
#[rustfmt::skip]
pub const INTERNAL_DIAGONAL: [u32; CELLS] = [
    0x1BAD15F3, 0x3DE281D0, 0x07DBDA9D, 0x1A18290E, 0x1C9996BC, 0x63BBB600,
    0x3439BB94, 0x144E3B58, 0x12127477, 0x47C90F87, 0x2818C698, 0x4780B8E0,
    0x3B090E11, 0x1EC00DBF, 0x48D36A06, 0x2CBB09A2, 0x378998D1, 0x0B2EDB35,
    0x0BEB895B, 0x644AE40E, 0x5CC1B670, 0x152E0252, 0x725B850E, 0x0274331B,
];
