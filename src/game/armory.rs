//! Static weapon catalog

use serde::{Deserialize, Serialize};

/// Every weapon the session knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WeaponKind {
    Glock,
    Pistol,
    Uzi,
    #[serde(rename = "AK47")]
    Ak47,
    #[serde(rename = "MP5")]
    Mp5,
    Grenade,
    BattleRifle,
    InfantryRifle,
    WebaverseRifle,
    Gun,
    Air908Rifle,
    #[serde(rename = "SniperAWP")]
    SniperAwp,
}

/// Weapon handling class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponClass {
    Pistol,
    Smg,
    Rifle,
    Sniper,
    Grenade,
}

/// Firing characteristics
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeaponStats {
    /// Rounds per minute
    pub rpm: f32,
    /// Damage per hit
    pub dmg: f32,
    /// Aim perturbation half-width, applied per axis
    pub spread: f32,
    /// Magazine capacity
    pub mag: u32,
    /// Reload duration (seconds)
    pub reload: f32,
    /// Whether held trigger repeats
    pub auto: bool,
}

impl WeaponStats {
    /// Seconds between consecutive rounds
    pub fn fire_interval(&self) -> f32 {
        60.0 / self.rpm
    }
}

/// Catalog row served to clients
#[derive(Debug, Clone, Serialize)]
pub struct ArmoryEntry {
    pub key: WeaponKind,
    pub name: &'static str,
    pub class: WeaponClass,
    pub sources: &'static [&'static str],
    pub scale: f32,
    pub stats: WeaponStats,
}

const fn stats(rpm: f32, dmg: f32, spread: f32, mag: u32, reload: f32, auto: bool) -> WeaponStats {
    WeaponStats {
        rpm,
        dmg,
        spread,
        mag,
        reload,
        auto,
    }
}

const UZI_SOURCES: &[&str] = &[
    "https://raw.githubusercontent.com/webaverse/uzi/main/uzi.glb",
    "https://raw.githubusercontent.com/webaverse-mmo/uzi/main/uzi.glb",
];

impl WeaponKind {
    pub const ALL: [WeaponKind; 12] = [
        WeaponKind::Glock,
        WeaponKind::Pistol,
        WeaponKind::Uzi,
        WeaponKind::Ak47,
        WeaponKind::Mp5,
        WeaponKind::Grenade,
        WeaponKind::BattleRifle,
        WeaponKind::InfantryRifle,
        WeaponKind::WebaverseRifle,
        WeaponKind::Gun,
        WeaponKind::Air908Rifle,
        WeaponKind::SniperAwp,
    ];

    /// Unlocked with full ammo at session start
    pub const STARTING: [WeaponKind; 3] = [WeaponKind::Glock, WeaponKind::Uzi, WeaponKind::Ak47];

    /// Drawn from when arming an enemy
    pub const ENEMY_POOL: [WeaponKind; 5] = [
        WeaponKind::Uzi,
        WeaponKind::Ak47,
        WeaponKind::Mp5,
        WeaponKind::BattleRifle,
        WeaponKind::InfantryRifle,
    ];

    pub fn stats(self) -> WeaponStats {
        match self {
            WeaponKind::Glock => stats(380.0, 24.0, 0.013, 17, 1.2, false),
            WeaponKind::Pistol => stats(320.0, 22.0, 0.014, 15, 1.3, false),
            WeaponKind::Uzi => stats(900.0, 18.0, 0.02, 32, 1.6, true),
            WeaponKind::Ak47 => stats(650.0, 32.0, 0.012, 30, 1.9, true),
            WeaponKind::Mp5 => stats(780.0, 20.0, 0.016, 30, 1.6, true),
            WeaponKind::Grenade => stats(60.0, 120.0, 0.03, 1, 2.4, false),
            WeaponKind::BattleRifle => stats(620.0, 34.0, 0.011, 28, 2.0, true),
            WeaponKind::InfantryRifle => stats(680.0, 28.0, 0.012, 30, 1.8, true),
            WeaponKind::WebaverseRifle => stats(640.0, 27.0, 0.012, 28, 1.7, true),
            WeaponKind::Gun => stats(320.0, 24.0, 0.014, 16, 1.4, false),
            WeaponKind::Air908Rifle => stats(610.0, 29.0, 0.012, 30, 1.9, true),
            WeaponKind::SniperAwp => stats(45.0, 120.0, 0.006, 7, 2.6, false),
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            WeaponKind::Glock => "Glock",
            WeaponKind::Pistol => "Pistol",
            WeaponKind::Uzi => "Uzi",
            WeaponKind::Ak47 => "AK-47",
            WeaponKind::Mp5 => "MP5",
            WeaponKind::Grenade => "Grenade",
            WeaponKind::BattleRifle => "Battle Rifle",
            WeaponKind::InfantryRifle => "Infantry Rifle",
            WeaponKind::WebaverseRifle => "Rifle",
            WeaponKind::Gun => "Gun",
            WeaponKind::Air908Rifle => "Rifle 908",
            WeaponKind::SniperAwp => "Sniper AWP",
        }
    }

    pub fn class(self) -> WeaponClass {
        match self {
            WeaponKind::Glock | WeaponKind::Pistol | WeaponKind::Gun => WeaponClass::Pistol,
            WeaponKind::Uzi | WeaponKind::Mp5 => WeaponClass::Smg,
            WeaponKind::Ak47
            | WeaponKind::BattleRifle
            | WeaponKind::InfantryRifle
            | WeaponKind::WebaverseRifle
            | WeaponKind::Air908Rifle => WeaponClass::Rifle,
            WeaponKind::SniperAwp => WeaponClass::Sniper,
            WeaponKind::Grenade => WeaponClass::Grenade,
        }
    }

    /// Model scale in the first-person rig
    pub fn scale(self) -> f32 {
        match self {
            WeaponKind::Glock | WeaponKind::Pistol | WeaponKind::Uzi => 0.6,
            WeaponKind::Ak47 => 0.8,
            WeaponKind::Mp5 => 0.75,
            WeaponKind::Grenade => 2.0,
            WeaponKind::Gun => 0.85,
            _ => 0.9,
        }
    }

    /// Model sources in fallback order
    pub fn sources(self) -> &'static [&'static str] {
        match self {
            WeaponKind::Glock => &[
                "https://raw.githubusercontent.com/webaverse/pistol/master/glock.glb",
                "https://raw.githubusercontent.com/webaverse/pistol/main/glock.glb",
            ],
            WeaponKind::Pistol => &[
                "https://raw.githubusercontent.com/webaverse/pistol/master/pistol.glb",
                "https://raw.githubusercontent.com/webaverse/pistol/main/pistol.glb",
            ],
            WeaponKind::Uzi | WeaponKind::Mp5 => UZI_SOURCES,
            WeaponKind::Ak47 => &["https://raw.githubusercontent.com/LazerMaker/gun-models-ak47-and-supprest-pistol-/master/ak47.glb"],
            WeaponKind::Grenade => {
                &["https://raw.githubusercontent.com/friuns2/bingextension/main/grenade.glb"]
            }
            WeaponKind::BattleRifle => {
                &["https://raw.githubusercontent.com/Sinojouni/games/main/battle_rifle_animated.glb"]
            }
            WeaponKind::InfantryRifle => &["https://raw.githubusercontent.com/ssdeanx/glb-textures/main/infantry_automatic_rifle.glb"],
            WeaponKind::WebaverseRifle => {
                &["https://raw.githubusercontent.com/webaverse/assets/master/rifle.glb"]
            }
            WeaponKind::Gun => {
                &["https://raw.githubusercontent.com/codewithtom/godot-fps/master/Assets/gun.glb"]
            }
            WeaponKind::Air908Rifle => {
                &["https://raw.githubusercontent.com/Air908/3dmodels/main/GunRifle.glb"]
            }
            WeaponKind::SniperAwp => {
                &["https://raw.githubusercontent.com/GarbajYT/godot-sniper-rifle/master/AWP.glb"]
            }
        }
    }

    pub fn is_grenade(self) -> bool {
        self == WeaponKind::Grenade
    }

    pub fn entry(self) -> ArmoryEntry {
        ArmoryEntry {
            key: self,
            name: self.display_name(),
            class: self.class(),
            sources: self.sources(),
            scale: self.scale(),
            stats: self.stats(),
        }
    }
}

/// The full catalog in display order
pub fn catalog() -> Vec<ArmoryEntry> {
    WeaponKind::ALL.iter().map(|k| k.entry()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_weapon() {
        let entries = catalog();
        assert_eq!(entries.len(), 12);
        assert!(entries.iter().all(|e| !e.sources.is_empty()));
        assert!(entries.iter().all(|e| e.stats.mag > 0 && e.stats.rpm > 0.0));
    }

    #[test]
    fn grenade_is_single_round() {
        let s = WeaponKind::Grenade.stats();
        assert_eq!(s.mag, 1);
        assert!(!s.auto);
        assert_eq!(WeaponKind::Grenade.class(), WeaponClass::Grenade);
    }

    #[test]
    fn enemy_pool_is_automatic() {
        for kind in WeaponKind::ENEMY_POOL {
            assert!(kind.stats().auto, "{kind:?}");
            assert!(!kind.is_grenade());
        }
    }

    #[test]
    fn keys_use_catalog_spelling() {
        assert_eq!(serde_json::to_string(&WeaponKind::Ak47).unwrap(), "\"AK47\"");
        assert_eq!(
            serde_json::from_str::<WeaponKind>("\"SniperAWP\"").unwrap(),
            WeaponKind::SniperAwp
        );
        assert_eq!(WeaponKind::Ak47.stats().mag, 30);
        assert!((WeaponKind::Uzi.stats().fire_interval() - 60.0 / 900.0).abs() < 1e-6);
    }
}
