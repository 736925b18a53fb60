//! # Reed-Solomon kernel
//!
//! GF(2^8) arithmetic, encoder and erasures-and-errors decoder shared by the
//! sector codec's inner blocks and the outer group codec. Follows the
//! classical decoder structure (syndrome → Berlekamp-Massey → Chien search
//! → Forney), with the generator tables held as owned state on a constructed
//! value rather than file statics.
//!
//! The field generator defaults to `0x11D` (`x^8+x^4+x^3+x^2+1`). Only the
//! conventional-RS parameterization (`J0 = 1`, `beta = alpha`) is supported,
//! which is what every call site in this crate uses.

use crate::error::RsError;

const MM: u32 = 8;
const NN: u16 = (1 << MM) - 1; // 255
const INFINITY: u16 = NN;

/// GF(2^8) log/antilog tables, built once from an irreducible polynomial.
#[derive(Clone)]
pub struct GaloisField {
    /// `alpha_exp[i] = alpha^i`, duplicated to length `2*NN` to avoid a
    /// modulo in the encoder/decoder inner loops.
    alpha_exp: Vec<u8>,
    /// `log_alpha[v]` is the power of alpha equal to the field element `v`;
    /// `log_alpha[0] = INFINITY`.
    log_alpha: Vec<u16>,
}

impl GaloisField {
    /// Build the field from an irreducible polynomial `p`, bit `i` of which
    /// is the coefficient of `x^i` (bit 8 implicitly 1). Default: `0x11D`.
    pub fn new(p: u16) -> Self {
        let mut alpha_exp = vec![0u8; 2 * NN as usize];
        for i in 0..MM as usize {
            alpha_exp[i] = 1 << i;
        }
        alpha_exp[MM as usize] = (p & NN) as u8;
        for i in (MM as usize + 1)..NN as usize {
            let prev = alpha_exp[i - 1];
            let mut next = (prev as u16) << 1;
            if prev & (1 << (MM - 1)) != 0 {
                next = (next & NN) ^ alpha_exp[MM as usize] as u16;
            }
            alpha_exp[i] = next as u8;
        }
        for i in 0..NN as usize {
            let v = alpha_exp[i];
            alpha_exp[NN as usize + i] = v;
        }
        let mut log_alpha = vec![0u16; NN as usize + 1];
        for i in 0..NN as usize {
            log_alpha[alpha_exp[i] as usize] = i as u16;
        }
        log_alpha[0] = INFINITY;
        GaloisField { alpha_exp, log_alpha }
    }

    /// The default Backer field generator, `x^8+x^4+x^3+x^2+1`.
    pub fn backer_default() -> Self {
        Self::new(0x11D)
    }
}

fn modnn(x: usize) -> usize {
    let mut x = x;
    while x >= NN as usize {
        x -= NN as usize;
    }
    x
}

/// A Reed-Solomon code descriptor: `(n, k, parity=n-k, interleave)`, plus the
/// precomputed generator polynomial (in log form). Construct once, share by
/// reference across every block that uses the same code parameters.
#[derive(Clone)]
pub struct ReedSolomon {
    gf: GaloisField,
    pub n: usize,
    pub k: usize,
    pub parity: usize,
    remainder_start: usize,
    /// generator polynomial coefficients in log form, length `parity+1`
    g: Vec<u16>,
}

impl ReedSolomon {
    /// `n` = code length, `k` = data symbols, `parity = n-k`.
    pub fn new(gf: GaloisField, n: usize, k: usize) -> Self {
        assert!(n as u16 <= NN && k < n);
        let parity = n - k;
        let remainder_start = if parity == 0 { 0 } else { (n - 1) % parity };
        let mut rs = ReedSolomon { gf, n, k, parity, remainder_start, g: vec![0; parity + 1] };
        rs.generate_poly();
        rs
    }

    /// `g(x) = prod_{i=0..parity-1} (x - alpha^(1+i))`, built in log form.
    fn generate_poly(&mut self) {
        if self.parity == 0 {
            return;
        }
        let log_alpha = &self.gf.log_alpha;
        let alpha_exp = &self.gf.alpha_exp;
        let mut g = vec![0u8; self.parity + 1];
        g[0] = 1;
        for i in 0..self.parity {
            g[i + 1] = 1;
            for j in (1..=i).rev() {
                if g[j] != 0 {
                    g[j] = g[j - 1] ^ alpha_exp[modnn(log_alpha[g[j] as usize] as usize + (1 + i))];
                } else {
                    g[j] = g[j - 1];
                }
            }
            g[0] = alpha_exp[modnn(log_alpha[g[0] as usize] as usize + (1 + i))];
        }
        for i in 0..=self.parity {
            self.g[i] = log_alpha[g[i] as usize];
        }
    }

    /// Encode `data` (`k` symbols, stride `stride_d`) into `parity`
    /// (`parity` symbols, stride `stride_p`). A `stride` of 1 means
    /// contiguous symbols; a larger stride lets several interleaved
    /// codewords share one buffer (see `sector::encode_sector`).
    pub fn encode(&self, data: &[u8], stride_d: usize, parity: &mut [u8], stride_p: usize) {
        if self.parity == 0 {
            return;
        }
        let alpha_exp = &self.gf.alpha_exp;
        let log_alpha = &self.gf.log_alpha;
        for i in 0..self.parity {
            parity[i * stride_p] = 0;
        }
        let mut b: isize = self.remainder_start as isize;
        for di in (0..self.k).rev() {
            let dsym = data[di * stride_d];
            let feedback = log_alpha[(dsym ^ parity[b as usize * stride_p]) as usize];
            if feedback != INFINITY {
                let feedback = feedback as usize;
                b -= 1;
                let mut g: isize = (self.parity - 1) as isize;
                while b >= 0 {
                    let gv = self.g[g as usize];
                    if gv != INFINITY {
                        parity[b as usize * stride_p] ^= alpha_exp[feedback + gv as usize];
                    }
                    g -= 1;
                    b -= 1;
                }
                b = self.parity as isize - 1;
                while g > 0 {
                    let gv = self.g[g as usize];
                    if gv != INFINITY {
                        parity[b as usize * stride_p] ^= alpha_exp[feedback + gv as usize];
                    }
                    b -= 1;
                    g -= 1;
                }
                let gv = self.g[g as usize];
                parity[b as usize * stride_p] = alpha_exp[feedback + gv as usize];
            } else {
                parity[b as usize * stride_p] = 0;
            }
            b -= 1;
            if b < 0 {
                b = self.parity as isize - 1;
            }
        }
    }

    /// Erasures-and-errors decode. `erasures` are zero-origin positions in
    /// the combined codeword: `[0, parity)` addresses the parity region,
    /// `[parity, n)` addresses the data region at offset `pos - parity`.
    /// Corrects `data`/`parity` in place and returns the number of symbols
    /// corrected.
    pub fn decode(
        &self,
        parity: &mut [u8],
        stride_p: usize,
        data: &mut [u8],
        stride_d: usize,
        erasures: &[usize],
    ) -> Result<usize, RsError> {
        if self.parity == 0 {
            return Ok(0);
        }
        let alpha_exp = &self.gf.alpha_exp;
        let log_alpha = &self.gf.log_alpha;
        let par = self.parity;
        let no_eras = erasures.len();

        // Syndromes: S_i = block(alpha^(i+1)) for i in [0, parity), where
        // block[0..parity) = parity symbols, block[parity..n) = data symbols.
        let mut s_val = vec![0u8; par];
        for i in 0..par {
            let mut acc = 0u8;
            for j in 0..self.n {
                let cj = if j < par { parity[j * stride_p] } else { data[(j - par) * stride_d] };
                if cj != 0 {
                    let exp = modnn(log_alpha[cj as usize] as usize + j * (1 + i));
                    acc ^= alpha_exp[exp];
                }
            }
            s_val[i] = acc;
        }
        if s_val.iter().all(|&v| v == 0) {
            return Ok(0);
        }
        let s: Vec<u16> = s_val.iter().map(|&v| log_alpha[v as usize]).collect();

        // lambda, temp: field-value domain. b: log domain.
        let mut lambda = vec![0u8; par + 1];
        lambda[0] = 1;
        if no_eras > 0 {
            lambda[1] = alpha_exp[modnn(erasures[0])];
            for i in 1..no_eras {
                let tmp = modnn(erasures[i]);
                for y in (1..=i + 1).rev() {
                    if lambda[y - 1] != 0 {
                        lambda[y] ^= alpha_exp[modnn(tmp + log_alpha[lambda[y - 1] as usize] as usize)];
                    }
                }
            }
        }
        let mut deg_lambda = no_eras;

        let mut b = vec![0u16; par + 1];
        for i in (deg_lambda + 1..=par).rev() {
            b[i] = INFINITY;
        }
        for i in (0..=deg_lambda).rev() {
            b[i] = log_alpha[lambda[i] as usize];
        }

        let mut temp = vec![0u8; par + 1];
        for j in no_eras..par {
            let mut discr = 0u8;
            for i in (0..=deg_lambda).rev() {
                if lambda[i] != 0 && i <= j && s[j - i] != INFINITY {
                    discr ^= alpha_exp[log_alpha[lambda[i] as usize] as usize + s[j - i] as usize];
                }
            }
            let discr_log = log_alpha[discr as usize];

            if discr_log == INFINITY {
                for idx in (1..=par).rev() {
                    b[idx] = b[idx - 1];
                }
                b[0] = INFINITY;
                continue;
            }

            for i in (1..=par).rev() {
                temp[i] = if b[i - 1] != INFINITY {
                    lambda[i] ^ alpha_exp[discr_log as usize + b[i - 1] as usize]
                } else {
                    lambda[i]
                };
            }
            temp[0] = lambda[0];

            if 2 * deg_lambda <= j + no_eras {
                deg_lambda = j + 1 + no_eras - deg_lambda;
                for i in (0..=par).rev() {
                    b[i] = if lambda[i] != 0 {
                        modnn(NN as usize - discr_log as usize + log_alpha[lambda[i] as usize] as usize) as u16
                    } else {
                        INFINITY
                    };
                }
            } else {
                for idx in (1..=par).rev() {
                    b[idx] = b[idx - 1];
                }
                b[0] = INFINITY;
            }
            lambda.copy_from_slice(&temp);
        }

        // Convert lambda to log domain for the Chien search.
        let mut lambda_log = vec![INFINITY; par + 1];
        for i in 0..=deg_lambda.min(par) {
            lambda_log[i] = log_alpha[lambda[i] as usize];
        }

        let mut root = vec![0u16; par];
        let mut loc = vec![0u16; par];
        let mut count = 0usize;
        let mut scan = vec![INFINITY; par + 1];
        for i in 1..=deg_lambda {
            scan[i] = lambda_log[i];
        }
        for i in 1..=(NN as usize) {
            let mut tmp = 1u8;
            for j in (1..=deg_lambda).rev() {
                if scan[j] != INFINITY {
                    scan[j] = modnn(scan[j] as usize + j) as u16;
                    tmp ^= alpha_exp[scan[j] as usize];
                }
            }
            if tmp != 0 {
                continue;
            }
            root[count] = i as u16;
            loc[count] = (NN as usize - i) as u16;
            if loc[count] as usize >= self.n {
                return Err(RsError::InvalidRoot);
            }
            count += 1;
            if count == deg_lambda {
                break;
            }
        }
        if deg_lambda != count {
            return Err(RsError::DegenerateRoots);
        }

        // Omega(x) = S(x)*Lambda(x) mod x^parity, in log form.
        // omega[k] accumulates contributions from every lambda coefficient
        // i (i <= k) paired with syndrome term s[k-i].
        let mut omega = vec![0u8; par];
        for i in 0..=deg_lambda.min(par.saturating_sub(1)) {
            if lambda_log[i] == INFINITY {
                continue;
            }
            for k in i..par {
                if s[k - i] != INFINITY {
                    omega[k] ^= alpha_exp[lambda_log[i] as usize + s[k - i] as usize];
                }
            }
        }
        let mut deg_omega: isize = -1;
        let mut omega_log = vec![INFINITY; par];
        for k in 0..par {
            if omega[k] != 0 {
                omega_log[k] = log_alpha[omega[k] as usize];
                deg_omega = k as isize;
            }
        }

        // Forney: Y_l = omega(X_l^-1) / (X_l^-1 * lambda'(X_l^-1)).
        // lambda'(x) (formal derivative, char-2 field) keeps only the
        // odd-power coefficients of lambda, shifted down one power: the
        // coefficient of x^m in lambda'(x) is lambda[m+1] for even m.
        let deriv_deg = (deg_lambda.min(par.saturating_sub(1))) & !1usize;
        for idx in (0..count).rev() {
            let y = root[idx] as usize;
            let mut den = 0u8;
            let mut m = deriv_deg as isize;
            while m >= 0 {
                let x_idx = (m + 1) as usize;
                if x_idx <= par && lambda_log[x_idx] != INFINITY {
                    den ^= alpha_exp[modnn(lambda_log[x_idx] as usize + (m as usize) * y)];
                }
                m -= 2;
            }
            if den == 0 {
                return Err(RsError::Forney);
            }
            let mut num = 0u8;
            let mut tmp2 = 0usize;
            for i in 0..=deg_omega.max(0) as usize {
                if omega_log[i] != INFINITY {
                    num ^= alpha_exp[omega_log[i] as usize + tmp2];
                }
                tmp2 += y;
                if tmp2 >= NN as usize {
                    tmp2 -= NN as usize;
                }
            }
            if num == 0 {
                continue;
            }
            let num_log = modnn(log_alpha[num as usize] as usize); // (J0-1)*y == 0 for J0=1
            let magnitude = alpha_exp[num_log + NN as usize - log_alpha[den as usize] as usize];
            let l = loc[idx] as usize;
            if l < par {
                parity[l * stride_p] ^= magnitude;
            } else {
                data[(l - par) * stride_d] ^= magnitude;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(n: usize, k: usize) -> ReedSolomon {
        ReedSolomon::new(GaloisField::backer_default(), n, k)
    }

    #[test]
    fn encode_decode_no_errors() {
        let rs = code(32, 28);
        let data: Vec<u8> = (0..28u32).map(|i| (i * 7 + 3) as u8).collect();
        let mut parity = vec![0u8; 4];
        rs.encode(&data, 1, &mut parity, 1);
        let mut d2 = data.clone();
        let mut p2 = parity.clone();
        let corrected = rs.decode(&mut p2, 1, &mut d2, 1, &[]).unwrap();
        assert_eq!(corrected, 0);
        assert_eq!(d2, data);
        assert_eq!(p2, parity);
    }

    #[test]
    fn corrects_single_error() {
        let rs = code(32, 28);
        let data: Vec<u8> = (0..28u32).map(|i| (i * 31 + 11) as u8).collect();
        let mut parity = vec![0u8; 4];
        rs.encode(&data, 1, &mut parity, 1);
        let mut d2 = data.clone();
        d2[5] ^= 0x42;
        let mut p2 = parity.clone();
        let corrected = rs.decode(&mut p2, 1, &mut d2, 1, &[]).unwrap();
        assert_eq!(corrected, 1);
        assert_eq!(d2, data);
    }

    #[test]
    fn corrects_full_erasure_budget() {
        let rs = code(32, 28);
        let data: Vec<u8> = (0..28u32).map(|i| (i * 13 + 1) as u8).collect();
        let mut parity = vec![0u8; 4];
        rs.encode(&data, 1, &mut parity, 1);
        let mut d2 = data.clone();
        let erasures = vec![4 + 0, 4 + 1, 4 + 2, 4 + 3]; // 4 data-region erasures = parity budget
        for &e in &erasures {
            d2[e - 4] = 0;
        }
        let mut p2 = parity.clone();
        let corrected = rs.decode(&mut p2, 1, &mut d2, 1, &erasures).unwrap();
        assert_eq!(corrected, 4);
        assert_eq!(d2, data);
    }

    #[test]
    fn interleaved_codewords_share_one_buffer() {
        let rs = code(16, 14);
        let interleave = 2;
        let mut buf_data = vec![0u8; 14 * interleave];
        for i in 0..buf_data.len() {
            buf_data[i] = (i * 17 + 5) as u8;
        }
        let mut buf_parity = vec![0u8; 2 * interleave];
        for blk in 0..interleave {
            rs.encode(&buf_data[blk..], interleave, &mut buf_parity[blk..], interleave);
        }
        let mut d2 = buf_data.clone();
        d2[3] ^= 0xFF; // corrupts block 1 (3 % 2 == 1)
        let mut p2 = buf_parity.clone();
        for blk in 0..interleave {
            let corrected = rs
                .decode(&mut p2[blk..], interleave, &mut d2[blk..], interleave, &[])
                .unwrap();
            if blk == 1 {
                assert_eq!(corrected, 1);
            } else {
                assert_eq!(corrected, 0);
            }
        }
        assert_eq!(d2, buf_data);
    }

    #[test]
    fn zero_parity_is_a_no_op() {
        let rs = code(8, 8);
        let data = vec![1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut parity: Vec<u8> = vec![];
        rs.encode(&data, 1, &mut parity, 1);
        let mut d2 = data.clone();
        let corrected = rs.decode(&mut [], 1, &mut d2, 1, &[]).unwrap();
        assert_eq!(corrected, 0);
        assert_eq!(d2, data);
    }
}
