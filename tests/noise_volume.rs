//! End-to-end checks on noise volume generation.
//!
//! Run with: cargo test --test noise_volume

use water_scene::noise::{NoiseVolume, SeedField, MAX_ZOOM};

#[test]
fn test_small_volume_has_every_cell_in_range() {
    let volume = NoiseVolume::generate(4, 4, 4);
    assert_eq!(volume.dimensions(), (4, 4, 4));
    assert_eq!(volume.len(), 64);
    for x in 0..4 {
        for y in 0..4 {
            for z in 0..4 {
                assert!(volume.get(x, y, z).is_some(), "missing cell {} {} {}", x, y, z);
            }
        }
    }
    assert_eq!(volume.get(4, 0, 0), None);
}

#[test]
fn test_seeded_generation_is_repeatable() {
    let a = NoiseVolume::generate_seeded(8, 8, 8, 1234);
    let b = NoiseVolume::generate_seeded(8, 8, 8, 1234);
    assert_eq!(a.values(), b.values());
}

#[test]
fn test_turbulence_is_bit_identical_across_calls() {
    let field = SeedField::seeded(6, 6, 6, 99);
    for (x, y, z) in [(0, 0, 0), (5, 5, 5), (2, 3, 4)] {
        let first = field.turbulence(x, y, z, MAX_ZOOM);
        let second = field.turbulence(x, y, z, MAX_ZOOM);
        assert_eq!(first.to_bits(), second.to_bits());
    }
}

#[test]
fn test_volume_matches_its_seed_field() {
    let field = SeedField::seeded(5, 3, 4, 7);
    let volume = NoiseVolume::from_seed_field(&field);
    assert_eq!(volume.dimensions(), (5, 3, 4));
    let expected = field.turbulence(4, 2, 3, MAX_ZOOM).floor().clamp(0.0, 255.0) as u8;
    assert_eq!(volume.get(4, 2, 3), Some(expected));
}

#[test]
fn test_texture_upload_layout() {
    let volume = NoiseVolume::generate_seeded(3, 2, 2, 5);
    let texels = volume.to_rgba8();
    assert_eq!(texels.len(), 3 * 2 * 2 * 4);
    // x runs fastest in texture order.
    let l = volume.get(1, 0, 0).unwrap();
    assert_eq!(&texels[4..8], &[l, l, l, 255]);
}
