use super::{MemoryStats, ReaderError, SensorSource, SwapStats};

pub fn read_ram(source: &mut dyn SensorSource) -> Result<MemoryStats, ReaderError> {
    let mem = source.memory();
    if mem.total_bytes == 0 {
        return Err(ReaderError::NoMemory);
    }
    let used = mem.total_bytes.saturating_sub(mem.available_bytes);
    Ok(MemoryStats {
        percent: used as f64 / mem.total_bytes as f64 * 100.0,
        free_bytes: mem.free_bytes,
        total_bytes: mem.total_bytes,
    })
}

pub fn read_swap(source: &mut dyn SensorSource) -> SwapStats {
    let swap = source.swap();
    let percent = if swap.total_bytes > 0 {
        swap.used_bytes as f64 / swap.total_bytes as f64 * 100.0
    } else {
        0.0
    };
    SwapStats {
        percent,
        free_bytes: swap.free_bytes,
        total_bytes: swap.total_bytes,
    }
}
