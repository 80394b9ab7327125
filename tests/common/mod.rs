use std::fs::File;
use std::io::Error;
use std::path::Path;

const HEADER: [&str; 7] = ["op", "caller", "ref", "amount", "deposit", "label", "at"];

pub fn generate_ops_csv(path: &Path, rows: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(HEADER)?;

    for i in 1..=rows {
        wtr.write_record([
            "schedule",
            "user1",
            &format!("r{i}"),
            "100",
            "100",
            "errand",
            "0",
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

pub fn generate_large_ops_csv(path: &Path, size_mb: usize) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(HEADER)?;

    let target_size = (size_mb * 1024 * 1024) as u64;
    let mut row = 1u64;

    // Check size every 5000 rows to avoid syscall overhead
    loop {
        for _ in 0..5000 {
            let caller = format!("user{}", (row % 50) + 1);
            wtr.write_record([
                "schedule",
                &caller,
                &format!("r{row}"),
                "100",
                "100",
                "errand",
                "0",
            ])?;
            row += 1;
        }
        wtr.flush()?; // Flush to ensure file size is updated
        if std::fs::metadata(path)?.len() >= target_size {
            break;
        }
    }
    Ok(())
}
