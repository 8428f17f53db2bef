use std::f64::consts::TAU;

/// Points per period; also the row count of the CSV.
const POINTS: usize = 1024;

fn sine(t: f64) -> f64 {
    (TAU * t).sin()
}

fn triangle(t: f64) -> f64 {
    let phase = t.fract();
    if phase < 0.5 {
        4.0 * phase - 1.0
    } else {
        3.0 - 4.0 * phase
    }
}

fn saw(t: f64) -> f64 {
    2.0 * t.fract() - 1.0
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    /// Uniform in [-1, 1).
    fn next_signed(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 52) as f64 - 1.0
    }
}

/// CSV with a header and three columns:
/// `sine` in [-1, 1], `triangle` in [-1, 1], `millivolts` noisy sine in [0, 500].
fn write_csv(path: &str, rng: &mut SimpleRng) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["sine", "triangle", "millivolts"])?;
    for i in 0..POINTS {
        let t = i as f64 / POINTS as f64;
        let mv = 250.0 + 240.0 * sine(2.0 * t) + 5.0 * rng.next_signed();
        writer.write_record(&[
            format!("{:.6}", sine(t)),
            format!("{:.6}", triangle(t)),
            format!("{mv:.2}"),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// 16-bit stereo WAV: sine on the left, saw on the right, four periods.
fn write_wav(path: &str) -> anyhow::Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: 48_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    let amplitude = f64::from(i16::MAX);
    for i in 0..POINTS * 4 {
        let t = i as f64 / POINTS as f64;
        writer.write_sample((sine(t) * amplitude) as i16)?;
        writer.write_sample((saw(t) * amplitude) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let mut rng = SimpleRng::new(42);

    let csv_path = "sample_wave.csv";
    write_csv(csv_path, &mut rng)?;
    println!("Wrote {POINTS} rows (sine, triangle, millivolts) to {csv_path}");
    println!("  try: awg-loader --csv {csv_path} -c 2 -r 2 0 500");

    let wav_path = "sample_wave.wav";
    write_wav(wav_path)?;
    println!("Wrote {} stereo frames to {wav_path}", POINTS * 4);
    println!("  try: awg-loader --wav {wav_path} -t 1.0 0.5");

    Ok(())
}
