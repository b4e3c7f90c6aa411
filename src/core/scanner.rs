//! Scan result aggregation
//!
//! Raw scan data is produced out of band by the platform, either as a JSON
//! array of records or as `wpa_cli scan_results` output. Entries are
//! deduplicated by SSID, keeping the strongest signal.

use std::{
    cmp::Reverse,
    collections::{HashMap, hash_map::Entry},
    path::PathBuf,
    time::{Duration, SystemTime},
};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::core::{
    error::{ScanError, ScanResult},
    types::{AuthType, ScanEntry, ScanInfo},
};

/// Deduplicated table of observed access points
#[derive(Debug, Default)]
pub struct ScanStore {
    table: HashMap<String, ScanEntry>,
    refreshed_at: Option<SystemTime>,
}

impl ScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the table with the entries parsed from `raw`
    ///
    /// Malformed records are skipped. If the data cannot be parsed at all the
    /// table is emptied and the refresh time is left untouched.
    pub fn refresh(&mut self, raw: &str, refreshed_at: SystemTime) -> ScanResult<usize> {
        let records = match parse_scan_data(raw) {
            Ok(records) => records,
            Err(e) => {
                self.table.clear();
                return Err(e);
            }
        };

        let mut table: HashMap<String, ScanEntry> = HashMap::with_capacity(records.len());
        for record in records {
            match table.entry(record.ssid.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
                // Ties keep the first record seen
                Entry::Occupied(mut slot) if record.quality > slot.get().quality => {
                    slot.insert(record);
                }
                Entry::Occupied(_) => {}
            }
        }

        self.table = table;
        self.refreshed_at = Some(refreshed_at);
        Ok(self.table.len())
    }

    /// Drop all entries after the source became unreadable
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Age and ordered copy of the entries as seen at `now`
    pub fn snapshot_at(&self, now: SystemTime) -> ScanInfo {
        let age_minutes = match self.refreshed_at {
            Some(refreshed_at) => {
                let elapsed = now.duration_since(refreshed_at).unwrap_or(Duration::ZERO);
                u16::try_from(elapsed.as_secs() / 60).unwrap_or(u16::MAX)
            }
            None => u16::MAX,
        };

        let mut entries: Vec<ScanEntry> = self.table.values().cloned().collect();
        entries.sort_by(|a, b| {
            (Reverse(a.quality), &a.ssid).cmp(&(Reverse(b.quality), &b.ssid))
        });

        ScanInfo {
            age_minutes,
            entries,
        }
    }

    pub fn snapshot(&self) -> ScanInfo {
        self.snapshot_at(SystemTime::now())
    }

    /// Authentication type advertised for `ssid`, if known
    pub fn auth_type_of(&self, ssid: &str) -> Option<AuthType> {
        self.table
            .get(ssid)
            .map(|entry| entry.auth_type)
            .filter(|auth| *auth != AuthType::Any)
    }
}

#[derive(Debug)]
struct ScanState {
    store: ScanStore,
    source_modified: Option<SystemTime>,
}

/// Scan data service backed by the platform's scan file
///
/// The file is re-parsed only when its modification time changes; that
/// modification time is the refresh time reported as the age.
pub struct ScanService {
    source: Option<PathBuf>,
    state: Mutex<ScanState>,
}

impl ScanService {
    pub fn new(source: Option<PathBuf>) -> Self {
        Self {
            source,
            state: Mutex::new(ScanState {
                store: ScanStore::new(),
                source_modified: None,
            }),
        }
    }

    /// Return the current scan snapshot, reloading the source if it changed
    pub async fn scan_info(&self) -> ScanInfo {
        let mut state = self.state.lock().await;
        if let Err(e) = self.reload_if_changed(&mut state).await {
            warn!("Scan data unavailable: {}", e);
        }
        state.store.snapshot()
    }

    /// Feed raw scan data directly instead of reading the source file
    pub async fn refresh(&self, raw: &str) -> ScanResult<usize> {
        self.state.lock().await.store.refresh(raw, SystemTime::now())
    }

    /// Authentication type last seen for `ssid`
    pub async fn auth_type_of(&self, ssid: &str) -> Option<AuthType> {
        let mut state = self.state.lock().await;
        if let Err(e) = self.reload_if_changed(&mut state).await {
            warn!("Scan data unavailable: {}", e);
        }
        state.store.auth_type_of(ssid)
    }

    async fn reload_if_changed(&self, state: &mut ScanState) -> ScanResult<()> {
        let Some(source) = &self.source else {
            return Ok(());
        };

        let modified = match tokio::fs::metadata(source).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                state.store.clear();
                state.source_modified = None;
                return Err(ScanError::Unreadable(format!("{}: {}", source.display(), e)));
            }
        };

        if state.source_modified == Some(modified) {
            return Ok(());
        }

        let raw = match tokio::fs::read_to_string(source).await {
            Ok(raw) => raw,
            Err(e) => {
                state.store.clear();
                state.source_modified = None;
                return Err(ScanError::Unreadable(format!("{}: {}", source.display(), e)));
            }
        };

        state.source_modified = Some(modified);
        let count = state.store.refresh(&raw, modified)?;
        debug!(count, "Scan data reloaded");
        Ok(())
    }
}

/// Parse either supported scan format
fn parse_scan_data(raw: &str) -> ScanResult<Vec<ScanEntry>> {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        parse_json_records(trimmed)
    } else {
        parse_wpa_cli_results(raw)
    }
}

#[derive(Debug, Deserialize)]
struct RawScanRecord {
    ssid: String,
    #[serde(default)]
    quality: i32,
    #[serde(default)]
    frequency: u32,
    #[serde(default)]
    channel: Option<u16>,
    #[serde(default)]
    encryption: Option<RawEncryption>,
}

#[derive(Debug, Default, Deserialize)]
struct RawEncryption {
    #[serde(default)]
    wep: bool,
    #[serde(default)]
    wpa: Option<i64>,
    #[serde(default)]
    group_ciphers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupCiphers {
    Unknown,
    Tkip,
    Ccmp,
    Both,
}

impl RawEncryption {
    fn auth_type(&self) -> AuthType {
        if self.wep {
            return AuthType::Wep;
        }

        let ciphers = match self.group_ciphers.as_slice() {
            [] => GroupCiphers::Unknown,
            [single] if single == "TKIP" => GroupCiphers::Tkip,
            [single] if single == "CCMP" => GroupCiphers::Ccmp,
            [_] => GroupCiphers::Unknown,
            _ => GroupCiphers::Both,
        };

        match (self.wpa, ciphers) {
            (Some(0), _) => AuthType::Open,
            (Some(1), GroupCiphers::Tkip) => AuthType::WpaTkip,
            (Some(1), GroupCiphers::Ccmp) => AuthType::WpaCcmp,
            (Some(1), _) => AuthType::WpaAuto,
            (Some(2 | 3), GroupCiphers::Tkip) => AuthType::Wpa2Tkip,
            (Some(2 | 3), GroupCiphers::Ccmp) => AuthType::Wpa2Ccmp,
            (Some(2 | 3), _) => AuthType::Wpa2Auto,
            _ => AuthType::Any,
        }
    }
}

fn parse_json_records(raw: &str) -> ScanResult<Vec<ScanEntry>> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(raw).map_err(|e| ScanError::Malformed(e.to_string()))?;

    let entries = values
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawScanRecord>(value) {
            Ok(record) if !record.ssid.is_empty() => Some(record),
            Ok(_) => None,
            Err(e) => {
                debug!("Skipping malformed scan record: {}", e);
                None
            }
        })
        .map(|record| ScanEntry {
            auth_type: record
                .encryption
                .as_ref()
                .map(RawEncryption::auth_type)
                .unwrap_or(AuthType::Any),
            channel: record
                .channel
                .unwrap_or_else(|| frequency_to_channel(record.frequency)),
            frequency: record.frequency,
            quality: record.quality,
            ssid: record.ssid,
        })
        .collect();

    Ok(entries)
}

/// Parse `wpa_cli scan_results` output
///
/// Fields are tab separated: bssid, frequency, signal level, flags, ssid.
/// Non-empty input with neither the header nor a single tab separated record
/// is rejected as malformed.
fn parse_wpa_cli_results(raw: &str) -> ScanResult<Vec<ScanEntry>> {
    let mut recognized = false;
    let mut entries = Vec::new();

    for line in raw.lines() {
        if line.starts_with("bssid /") {
            recognized = true;
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 5 {
            continue;
        }
        recognized = true;
        if parts[4].is_empty() {
            continue;
        }

        let Ok(frequency) = parts[1].parse::<u32>() else {
            debug!(line, "Skipping scan line with invalid frequency");
            continue;
        };
        let Ok(quality) = parts[2].parse::<i32>() else {
            debug!(line, "Skipping scan line with invalid signal level");
            continue;
        };

        entries.push(ScanEntry {
            ssid: parts[4].to_string(),
            quality,
            auth_type: flags_to_auth_type(parts[3]),
            channel: frequency_to_channel(frequency),
            frequency,
        });
    }

    if !recognized && !raw.trim().is_empty() {
        return Err(ScanError::Malformed(
            "neither a JSON array nor wpa_cli scan results".into(),
        ));
    }
    Ok(entries)
}

/// Derive the authentication type from wpa_supplicant flags such as `[WPA2-PSK-CCMP][ESS]`
fn flags_to_auth_type(flags: &str) -> AuthType {
    let pick = |prefix: &str, tkip: AuthType, ccmp: AuthType, auto: AuthType| {
        let flag = flags
            .split(']')
            .map(|f| f.trim_start_matches('['))
            .find(|f| f.starts_with(prefix))?;
        Some(match (flag.contains("CCMP"), flag.contains("TKIP")) {
            (true, false) => ccmp,
            (false, true) => tkip,
            _ => auto,
        })
    };

    pick("WPA2-", AuthType::Wpa2Tkip, AuthType::Wpa2Ccmp, AuthType::Wpa2Auto)
        .or_else(|| pick("RSN-", AuthType::Wpa2Tkip, AuthType::Wpa2Ccmp, AuthType::Wpa2Auto))
        .or_else(|| pick("WPA-", AuthType::WpaTkip, AuthType::WpaCcmp, AuthType::WpaAuto))
        .unwrap_or(if flags.contains("[WEP]") {
            AuthType::Wep
        } else {
            AuthType::Open
        })
}

/// Convert frequency (MHz) to channel number, 0 if unmapped
fn frequency_to_channel(frequency: u32) -> u16 {
    let channel = match frequency {
        2484 => 14,
        2412..=2472 => (frequency - 2407) / 5,
        5160..=5885 => (frequency - 5000) / 5,
        _ => 0,
    };
    u16::try_from(channel).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::{collections::HashSet, fs::File};

    const WPA_CLI_HEADER: &str = "bssid / frequency / signal level / flags / ssid\n";

    fn ssids(info: &ScanInfo) -> Vec<&str> {
        info.entries.iter().map(|e| e.ssid.as_str()).collect()
    }

    #[test]
    fn test_dedup_keeps_strongest() {
        let raw = format!(
            "{WPA_CLI_HEADER}\
             01:02:03:04:05:06\t2412\t-70\t[WPA2-PSK-CCMP][ESS]\thome\n\
             01:02:03:04:05:07\t5180\t-40\t[WPA2-PSK-CCMP][ESS]\thome\n\
             01:02:03:04:05:08\t2437\t-60\t[ESS]\tcafe\n\
             01:02:03:04:05:09\t2462\t-80\t[WPA2-PSK-CCMP][ESS]\thome"
        );
        let mut store = ScanStore::new();
        assert_eq!(store.refresh(&raw, SystemTime::now()).unwrap(), 2);

        let info = store.snapshot();
        assert_eq!(ssids(&info), vec!["home", "cafe"]);
        assert_eq!(info.entries[0].quality, -40);
        assert_eq!(info.entries[0].channel, 36);
        assert_eq!(info.entries[0].frequency, 5180);
        assert_eq!(info.entries[1].auth_type, AuthType::Open);
    }

    #[test]
    fn test_dedup_tie_keeps_first() {
        let raw = r#"[
            {"ssid": "home", "quality": 50, "channel": 1},
            {"ssid": "home", "quality": 50, "channel": 11}
        ]"#;
        let mut store = ScanStore::new();
        store.refresh(raw, SystemTime::now()).unwrap();

        let info = store.snapshot();
        assert_eq!(info.entries.len(), 1);
        assert_eq!(info.entries[0].channel, 1);
    }

    #[test]
    fn test_dedup_invariant_over_many_records() {
        let mut raw = String::from(WPA_CLI_HEADER);
        for i in 0..60 {
            raw.push_str(&format!(
                "00:00:00:00:00:{:02x}\t2412\t-{}\t[ESS]\tnet{}\n",
                i,
                30 + (i * 7) % 50,
                i % 7
            ));
        }
        let mut store = ScanStore::new();
        store.refresh(&raw, SystemTime::now()).unwrap();
        let info = store.snapshot();

        let unique: HashSet<&str> = ssids(&info).into_iter().collect();
        assert_eq!(unique.len(), info.entries.len());
        assert_eq!(info.entries.len(), 7);
        for entry in &info.entries {
            let best = (0..60)
                .filter(|i| format!("net{}", i % 7) == entry.ssid)
                .map(|i| -(30 + (i * 7) % 50))
                .max()
                .unwrap();
            assert_eq!(entry.quality, best);
        }
    }

    #[test]
    fn test_json_auth_types() {
        let raw = r#"[
            {"ssid": "open", "encryption": {"wpa": 0}},
            {"ssid": "wep", "encryption": {"wep": true, "wpa": 2}},
            {"ssid": "wpa-tkip", "encryption": {"wpa": 1, "group_ciphers": ["TKIP"]}},
            {"ssid": "wpa2-ccmp", "encryption": {"wpa": 2, "group_ciphers": ["CCMP"]}},
            {"ssid": "mixed", "encryption": {"wpa": 3, "group_ciphers": ["TKIP", "CCMP"]}},
            {"ssid": "unknown"}
        ]"#;
        let mut store = ScanStore::new();
        store.refresh(raw, SystemTime::now()).unwrap();

        assert_eq!(store.auth_type_of("open"), Some(AuthType::Open));
        assert_eq!(store.auth_type_of("wep"), Some(AuthType::Wep));
        assert_eq!(store.auth_type_of("wpa-tkip"), Some(AuthType::WpaTkip));
        assert_eq!(store.auth_type_of("wpa2-ccmp"), Some(AuthType::Wpa2Ccmp));
        assert_eq!(store.auth_type_of("mixed"), Some(AuthType::Wpa2Auto));
        assert_eq!(store.auth_type_of("unknown"), None);
        assert_eq!(store.auth_type_of("missing"), None);
    }

    #[test]
    fn test_malformed_records_skipped() {
        let raw = r#"[
            {"ssid": "good", "quality": 10},
            {"quality": 99},
            {"ssid": 42},
            "not an object",
            {"ssid": ""},
            {"ssid": "also-good", "quality": 5}
        ]"#;
        let mut store = ScanStore::new();
        assert_eq!(store.refresh(raw, SystemTime::now()).unwrap(), 2);

        let info = store.snapshot();
        assert_eq!(ssids(&info), vec!["good", "also-good"]);
    }

    #[test]
    fn test_malformed_wpa_cli_lines_skipped() {
        let raw = format!(
            "{WPA_CLI_HEADER}\
             01:02:03:04:05:06\t2412\t-50\t[WPA2-PSK-CCMP][ESS]\tValidNetwork\n\
             malformed line with not enough fields\n\
             01:02:03:04:05:07\t2412\tinvalid\t[ESS]\tBadSignal\n\
             01:02:03:04:05:09\tfast\t-50\t[ESS]\tBadFrequency\n\
             01:02:03:04:05:08\t2412\t-50\t[ESS]\t\n\
             aa:bb:cc:dd:ee:ff\t5180\t-70\t[WPA-PSK-TKIP][ESS]\tAnotherValid"
        );
        let mut store = ScanStore::new();
        store.refresh(&raw, SystemTime::now()).unwrap();

        let info = store.snapshot();
        assert_eq!(ssids(&info), vec!["ValidNetwork", "AnotherValid"]);
        assert_eq!(info.entries[0].auth_type, AuthType::Wpa2Ccmp);
        assert_eq!(info.entries[1].auth_type, AuthType::WpaTkip);
    }

    #[test]
    fn test_unreadable_data_keeps_age() {
        let refreshed = SystemTime::now() - Duration::from_secs(5 * 60 + 30);
        let mut store = ScanStore::new();
        store
            .refresh(r#"[{"ssid": "home", "quality": 1}]"#, refreshed)
            .unwrap();

        assert!(store.refresh("[not json", SystemTime::now()).is_err());

        let info = store.snapshot();
        assert!(info.entries.is_empty());
        assert_eq!(info.age_minutes, 5);
    }

    #[test]
    fn test_unrecognized_text_keeps_age() {
        let now = SystemTime::now();
        let mut store = ScanStore::new();
        store
            .refresh(r#"[{"ssid": "home", "quality": 1}]"#, now - Duration::from_secs(10 * 60))
            .unwrap();

        assert!(matches!(
            store.refresh(r#"{"not": "a scan"}"#, now),
            Err(ScanError::Malformed(_))
        ));
        let info = store.snapshot_at(now);
        assert!(info.entries.is_empty());
        assert_eq!(info.age_minutes, 10);

        assert!(store.refresh("\u{1}\u{7f}garbage\u{0}", now).is_err());
        assert_eq!(store.snapshot_at(now).age_minutes, 10);
    }

    #[test]
    fn test_empty_wpa_cli_output_is_a_scan() {
        let now = SystemTime::now();
        let mut store = ScanStore::new();

        assert_eq!(store.refresh(WPA_CLI_HEADER, now).unwrap(), 0);
        assert_eq!(store.snapshot_at(now).age_minutes, 0);
        assert_eq!(store.refresh("", now).unwrap(), 0);
    }

    #[test]
    fn test_age_floor_and_saturation() {
        let now = SystemTime::now();
        let mut store = ScanStore::new();
        assert_eq!(store.snapshot_at(now).age_minutes, u16::MAX);

        store.refresh("[]", now - Duration::from_secs(119)).unwrap();
        assert_eq!(store.snapshot_at(now).age_minutes, 1);

        store
            .refresh("[]", now - Duration::from_secs(60 * 70_000))
            .unwrap();
        assert_eq!(store.snapshot_at(now).age_minutes, u16::MAX);

        // Clock going backwards is not a negative age
        store.refresh("[]", now + Duration::from_secs(600)).unwrap();
        assert_eq!(store.snapshot_at(now).age_minutes, 0);
    }

    #[test]
    fn test_snapshot_stable_without_refresh() {
        let raw = r#"[
            {"ssid": "b", "quality": 10},
            {"ssid": "a", "quality": 10},
            {"ssid": "c", "quality": 20}
        ]"#;
        let now = SystemTime::now();
        let mut store = ScanStore::new();
        store.refresh(raw, now).unwrap();

        let first = store.snapshot_at(now);
        let second = store.snapshot_at(now);
        assert_eq!(first, second);
        assert_eq!(ssids(&first), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_flags_to_auth_type() {
        assert_eq!(flags_to_auth_type("[WPA2-PSK-CCMP][ESS]"), AuthType::Wpa2Ccmp);
        assert_eq!(flags_to_auth_type("[WPA2-PSK-TKIP][ESS]"), AuthType::Wpa2Tkip);
        assert_eq!(
            flags_to_auth_type("[WPA-PSK-CCMP+TKIP][WPA2-PSK-CCMP+TKIP][ESS]"),
            AuthType::Wpa2Auto
        );
        assert_eq!(flags_to_auth_type("[WPA-PSK-CCMP][ESS]"), AuthType::WpaCcmp);
        assert_eq!(flags_to_auth_type("[WEP][ESS]"), AuthType::Wep);
        assert_eq!(flags_to_auth_type("[WPS][ESS]"), AuthType::Open);
        assert_eq!(flags_to_auth_type(""), AuthType::Open);
    }

    #[test]
    fn test_frequency_to_channel() {
        assert_eq!(frequency_to_channel(2412), 1);
        assert_eq!(frequency_to_channel(2437), 6);
        assert_eq!(frequency_to_channel(2472), 13);
        assert_eq!(frequency_to_channel(2484), 14);
        assert_eq!(frequency_to_channel(5180), 36);
        assert_eq!(frequency_to_channel(5745), 149);
        assert_eq!(frequency_to_channel(5825), 165);
        assert_eq!(frequency_to_channel(9999), 0);
        assert_eq!(frequency_to_channel(0), 0);
    }

    #[tokio::test]
    async fn test_service_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        std::fs::write(&path, r#"[{"ssid": "home", "quality": 3}]"#).unwrap();

        let service = ScanService::new(Some(path));
        let first = service.scan_info().await;
        let second = service.scan_info().await;

        assert_eq!(ssids(&first), vec!["home"]);
        assert_eq!(first.age_minutes, 0);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_service_missing_file_is_recoverable() {
        let dir = tempfile::tempdir().unwrap();
        let service = ScanService::new(Some(dir.path().join("missing")));

        let info = service.scan_info().await;
        assert!(info.entries.is_empty());
        assert_eq!(info.age_minutes, u16::MAX);
    }

    #[tokio::test]
    async fn test_service_direct_refresh() {
        let service = ScanService::new(None);
        service
            .refresh(r#"[{"ssid": "lab", "encryption": {"wpa": 2}}]"#)
            .await
            .unwrap();

        assert_eq!(service.auth_type_of("lab").await, Some(AuthType::Wpa2Auto));
        assert_eq!(service.scan_info().await.entries.len(), 1);
    }

    fn write_scan_file(path: &std::path::Path, content: &str, modified: SystemTime) {
        std::fs::write(path, content).unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(modified)
            .unwrap();
    }

    #[tokio::test]
    async fn test_service_reloads_on_mtime_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        let now = SystemTime::now();

        write_scan_file(
            &path,
            r#"[{"ssid": "home", "quality": 3}]"#,
            now - Duration::from_secs(10 * 60),
        );
        let service = ScanService::new(Some(path.clone()));
        let info = service.scan_info().await;
        assert_eq!(ssids(&info), vec!["home"]);
        assert_eq!(info.age_minutes, 10);

        // Same modification time: the new content is not picked up
        write_scan_file(
            &path,
            r#"[{"ssid": "cafe", "quality": 3}]"#,
            now - Duration::from_secs(10 * 60),
        );
        assert_eq!(ssids(&service.scan_info().await), vec!["home"]);

        write_scan_file(
            &path,
            r#"[{"ssid": "office", "quality": 5}]"#,
            now - Duration::from_secs(3 * 60),
        );
        let info = service.scan_info().await;
        assert_eq!(ssids(&info), vec!["office"]);
        assert_eq!(info.age_minutes, 3);
    }

    #[tokio::test]
    async fn test_service_source_removed_keeps_age() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        write_scan_file(
            &path,
            r#"[{"ssid": "home", "quality": 3, "encryption": {"wpa": 2}}]"#,
            SystemTime::now() - Duration::from_secs(4 * 60),
        );

        let service = ScanService::new(Some(path.clone()));
        assert_eq!(service.scan_info().await.entries.len(), 1);

        std::fs::remove_file(&path).unwrap();
        let info = service.scan_info().await;
        assert!(info.entries.is_empty());
        assert_eq!(info.age_minutes, 4);
        assert_eq!(service.auth_type_of("home").await, None);
    }
}
