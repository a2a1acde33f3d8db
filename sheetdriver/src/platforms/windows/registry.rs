use super::utils::wide;
use crate::config::RegistryLookup;
use crate::platforms::InstallRegistry;
use crate::AutomationError;
use std::path::PathBuf;
use tracing::{debug, info};
use windows::core::PCWSTR;
use windows::Win32::Foundation::ERROR_SUCCESS;
use windows::Win32::System::Registry::{RegGetValueW, HKEY_LOCAL_MACHINE, RRF_RT_REG_SZ};

/// Reads install locations from HKEY_LOCAL_MACHINE.
#[derive(Debug, Default)]
pub struct Win32Registry;

fn read_string(key: &str, value: &str) -> Result<String, AutomationError> {
    let key_w = wide(key);
    let value_w = wide(value);
    let value_ptr = if value.is_empty() {
        PCWSTR::null()
    } else {
        PCWSTR(value_w.as_ptr())
    };

    unsafe {
        let mut size: u32 = 0;
        let status = RegGetValueW(
            HKEY_LOCAL_MACHINE,
            PCWSTR(key_w.as_ptr()),
            value_ptr,
            RRF_RT_REG_SZ,
            None,
            None,
            Some(&mut size as *mut u32),
        );
        if status != ERROR_SUCCESS {
            return Err(AutomationError::PlatformError(format!(
                "RegGetValueW({key}\\{value}) size query failed: {status:?}"
            )));
        }

        let mut buf = vec![0u16; (size as usize).div_ceil(2)];
        let status = RegGetValueW(
            HKEY_LOCAL_MACHINE,
            PCWSTR(key_w.as_ptr()),
            value_ptr,
            RRF_RT_REG_SZ,
            None,
            Some(buf.as_mut_ptr().cast()),
            Some(&mut size as *mut u32),
        );
        if status != ERROR_SUCCESS {
            return Err(AutomationError::PlatformError(format!(
                "RegGetValueW({key}\\{value}) failed: {status:?}"
            )));
        }
        let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
        Ok(String::from_utf16_lossy(&buf[..len]))
    }
}

impl InstallRegistry for Win32Registry {
    fn registered_paths(&self, lookups: &[RegistryLookup]) -> Vec<PathBuf> {
        lookups
            .iter()
            .filter_map(|lookup| match read_string(&lookup.key, &lookup.value) {
                Ok(raw) if !raw.trim().is_empty() => {
                    let base = PathBuf::from(raw.trim().trim_matches('"'));
                    let path = match &lookup.file_name {
                        Some(file) => base.join(file),
                        None => base,
                    };
                    info!("Registry entry {} names {}", lookup.key, path.display());
                    Some(path)
                }
                Ok(_) => None,
                Err(e) => {
                    debug!("Registry lookup skipped: {}", e);
                    None
                }
            })
            .collect()
    }
}
