//! CCM implementation.

use cipher::block::generic_array::typenum::Unsigned;
use cipher::block::generic_array::{ArrayLength, GenericArray};
use cipher::block::{Block, BlockCipher};

use subtle::ConstantTimeEq;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::error::Error;
use crate::lengths::{maximum_length_for_message, nonce_length_for_message};

/// Block size in octets of the underlying cipher. CCM is only defined for
/// 128-bit block ciphers.
pub const BLOCK_SIZE: usize = 16;

/// CCM over AES-128.
#[cfg(feature = "aes")]
#[cfg_attr(docsrs, doc(cfg(feature = "aes")))]
pub type Aes128Ccm = CcmMode<aes::Aes128>;

/// CCM over AES-192.
#[cfg(feature = "aes")]
#[cfg_attr(docsrs, doc(cfg(feature = "aes")))]
pub type Aes192Ccm = CcmMode<aes::Aes192>;

/// CCM over AES-256.
#[cfg(feature = "aes")]
#[cfg_attr(docsrs, doc(cfg(feature = "aes")))]
pub type Aes256Ccm = CcmMode<aes::Aes256>;

/// A CCM instance: a 128-bit block cipher together with the tag size `M`
/// and the length-field width `L` from RFC 3610.
///
/// The instance is immutable once constructed; [`seal`](CcmMode::seal) and
/// [`open`](CcmMode::open) keep all working state on the stack, so a single
/// instance may serve concurrent calls as long as the block cipher's
/// single-block encrypt is reentrant.
///
/// The nonce handling follows SJCL rather than the letter of the RFC: both
/// `seal` and `open` first derive the nonce length from the message length
/// and silently truncate a longer nonce to that prefix. Callers that hold
/// RFC-style fixed-length nonces are unaffected, since the derived length
/// equals `15 - L` whenever the message fits the context's length field.
pub struct CcmMode<C>
where
    C: BlockCipher,
    C::ParBlocks: ArrayLength<Block<C>>,
{
    /// Block cipher keying both the CBC-MAC and the CTR stream.
    cipher: C,

    /// Tag size in octets, the `M` parameter. Even, in 4..=16.
    m: usize,

    /// Length-field width in octets, the `L` parameter. In 2..=8.
    l: usize,
}

impl<C> CcmMode<C>
where
    C: BlockCipher,
    C::ParBlocks: ArrayLength<Block<C>>,
{
    /// Creates a `CcmMode` for the given tag size and nonce size.
    ///
    /// `tag_size` must be one of 4, 6, 8, 10, 12, 14 or 16; `nonce_size`
    /// must lie in 7..=13, which fixes `L = 15 - nonce_size`. The cipher
    /// must operate on 16-octet blocks.
    pub fn new(cipher: C, tag_size: usize, nonce_size: usize) -> Result<Self, Error> {
        if C::BlockSize::to_usize() != BLOCK_SIZE {
            return Err(Error::InvalidBlockSize);
        }
        if tag_size < 4 || tag_size > 16 || tag_size % 2 == 1 {
            return Err(Error::TagSize);
        }
        if nonce_size < 7 || nonce_size > 13 {
            return Err(Error::NonceSize);
        }
        Ok(CcmMode {
            cipher,
            m: tag_size,
            l: 15 - nonce_size,
        })
    }

    /// The nonce size in octets, `15 - L`.
    pub fn nonce_size(&self) -> usize {
        15 - self.l
    }

    /// The ciphertext expansion in octets, equal to the tag size `M`.
    pub fn overhead(&self) -> usize {
        self.m
    }

    /// The maximum plaintext length accepted by [`seal`](CcmMode::seal).
    ///
    /// The maximum ciphertext length accepted by [`open`](CcmMode::open) is
    /// `max_length() + overhead()`.
    pub fn max_length(&self) -> usize {
        maximum_length_for_message(self.l, self.m)
    }

    /// Encrypts and authenticates `plaintext`, authenticates `adata`, and
    /// appends `ciphertext || tag` to `dst`.
    ///
    /// A nonce longer than the length derived from `plaintext.len()` is
    /// truncated to that prefix first; the derived length must then agree
    /// with the nonce size the context was built for. The output is a pure
    /// function of the inputs.
    pub fn seal(
        &self,
        dst: &mut Vec<u8>,
        nonce: &[u8],
        plaintext: &[u8],
        adata: &[u8],
    ) -> Result<(), Error> {
        let derived = nonce_length_for_message(plaintext.len());
        let nonce = &nonce[..nonce.len().min(derived)];
        if 15 - derived != self.l {
            return Err(Error::InvalidNonceLength);
        }

        let mut tag = self.compute_tag(nonce, plaintext, adata)?;
        let mut counter = [0u8; BLOCK_SIZE];
        self.mask_tag(nonce, &mut tag, &mut counter);

        dst.reserve(plaintext.len() + self.m);
        let body = dst.len();
        dst.extend_from_slice(plaintext);
        self.ctr_xor(&mut counter, &mut dst[body..]);
        dst.extend_from_slice(&tag[..self.m]);
        Ok(())
    }

    /// Decrypts and authenticates `ciphertext`, authenticates `adata`, and
    /// appends the recovered plaintext to `dst`.
    ///
    /// The nonce is truncated against the derived length just like in
    /// [`seal`](CcmMode::seal), but the derived length is not required to
    /// match the context's nonce size here; a nonce of the wrong length
    /// surfaces as [`Error::NonceSize`] from the tag computation instead.
    /// On authentication failure the decrypted buffer is wiped and only
    /// [`Error::AuthenticationFailed`] is reported.
    pub fn open(
        &self,
        dst: &mut Vec<u8>,
        nonce: &[u8],
        ciphertext: &[u8],
        adata: &[u8],
    ) -> Result<(), Error> {
        let derived =
            nonce_length_for_message(ciphertext.len().saturating_sub(self.m));
        let nonce = &nonce[..nonce.len().min(derived)];

        if ciphertext.len() > self.max_length() + self.m {
            return Err(Error::CiphertextTooLong);
        }
        if ciphertext.len() < self.m {
            return Err(Error::CiphertextTooShort);
        }

        let (body, received) = ciphertext.split_at(ciphertext.len() - self.m);

        // Unmask the received tag back to the raw CBC-MAC value, so the
        // comparison below runs against the recomputed MAC directly.
        let mut tag = [0u8; BLOCK_SIZE];
        tag[..self.m].copy_from_slice(received);
        let mut counter = [0u8; BLOCK_SIZE];
        self.mask_tag(nonce, &mut tag, &mut counter);

        let mut plaintext = body.to_vec();
        self.ctr_xor(&mut counter, &mut plaintext);

        let expected = match self.compute_tag(nonce, &plaintext, adata) {
            Ok(mac) => mac,
            Err(e) => {
                plaintext.iter_mut().for_each(|b| *b = 0);
                return Err(e);
            }
        };

        if expected[..self.m].ct_eq(&tag[..self.m]).unwrap_u8() == 0 {
            // Erase the decrypted buffer
            plaintext.iter_mut().for_each(|b| *b = 0);
            return Err(Error::AuthenticationFailed);
        }

        dst.extend_from_slice(&plaintext);
        Ok(())
    }

    /// Runs the CBC-MAC of RFC 3610 §2.2 over `(nonce, plaintext, adata)`
    /// and returns the full MAC block; the tag is its first `M` octets.
    fn compute_tag(
        &self,
        nonce: &[u8],
        plaintext: &[u8],
        adata: &[u8],
    ) -> Result<[u8; BLOCK_SIZE], Error> {
        if plaintext.len() > self.max_length() {
            return Err(Error::PlaintextTooLong);
        }
        if nonce.len() != self.nonce_size() {
            return Err(Error::NonceSize);
        }

        // The first block B_0:
        //   octet 0        Flags = 64*Adata + 8*M' + L'
        //   octets 1..15-L nonce
        //   octets 16-L..  l(m), big-endian
        // The message length is written as a full 64-bit value; for L < 8
        // the nonce copy that follows overwrites the high-order overlap,
        // leaving exactly the low L octets in the length field.
        let mut mac = [0u8; BLOCK_SIZE];
        mac[0] = if adata.is_empty() { 0 } else { 0x40 }
            | ((((self.m - 2) / 2) << 3) as u8)
            | (self.l - 1) as u8;
        mac[8..].copy_from_slice(&(plaintext.len() as u64).to_be_bytes());
        mac[1..BLOCK_SIZE - self.l].copy_from_slice(nonce);
        self.encrypt_block(&mut mac);

        if !adata.is_empty() {
            let mut block = [0u8; BLOCK_SIZE];
            let prefix = encode_adata_length(&mut block, adata.len() as u64);
            let head = (BLOCK_SIZE - prefix).min(adata.len());
            block[prefix..prefix + head].copy_from_slice(&adata[..head]);
            self.cbc_step(&mut mac, &block);
            self.cbc_chunks(&mut mac, &adata[head..]);
        }

        if !plaintext.is_empty() {
            self.cbc_chunks(&mut mac, plaintext);
        }

        Ok(mac)
    }

    /// Builds `A_0 = [L-1 | nonce | 0..0]`, XORs its encryption into the
    /// first `M` octets of `tag`, and advances `counter` to `A_1` by
    /// setting the low octet to 1.
    fn mask_tag(
        &self,
        nonce: &[u8],
        tag: &mut [u8; BLOCK_SIZE],
        counter: &mut [u8; BLOCK_SIZE],
    ) {
        counter[0] = (self.l - 1) as u8;
        // `open` reaches this with a nonce that has not been length-checked
        // yet; copy at most the nonce field's width.
        let n = nonce.len().min(BLOCK_SIZE - 1 - self.l);
        counter[1..1 + n].copy_from_slice(&nonce[..n]);

        let mut mask = *counter;
        self.encrypt_block(&mut mask);
        xor_bytes(&mut tag[..self.m], &mask);

        counter[BLOCK_SIZE - 1] |= 1;
    }

    /// One CBC-MAC step: XOR a 16-octet block into the MAC state and
    /// encrypt the result in place.
    fn cbc_step(&self, mac: &mut [u8; BLOCK_SIZE], block: &[u8]) {
        xor_bytes(mac, block);
        self.encrypt_block(mac);
    }

    /// CBC-MACs `data` in 16-octet chunks. The final short chunk is padded
    /// with zeros by XORing only its bytes into the state; there is no
    /// cryptographic padding.
    fn cbc_chunks(&self, mac: &mut [u8; BLOCK_SIZE], data: &[u8]) {
        let mut chunks = data.chunks_exact(BLOCK_SIZE);
        for chunk in &mut chunks {
            self.cbc_step(mac, chunk);
        }
        let rest = chunks.remainder();
        if !rest.is_empty() {
            let mut block = [0u8; BLOCK_SIZE];
            block[..rest.len()].copy_from_slice(rest);
            self.cbc_step(mac, &block);
        }
    }

    /// Applies the CTR keystream starting at `counter` to `data` in place,
    /// leaving `counter` past the last block used.
    fn ctr_xor(&self, counter: &mut [u8; BLOCK_SIZE], data: &mut [u8]) {
        let mut keystream = [0u8; BLOCK_SIZE];
        for chunk in data.chunks_mut(BLOCK_SIZE) {
            keystream.copy_from_slice(counter);
            self.encrypt_block(&mut keystream);
            increment_be(counter);
            xor_bytes(chunk, &keystream);
        }
    }

    /// Single-block encrypt through the opaque cipher. `new` guarantees
    /// the cipher's block size is 16, so the slice conversion cannot fail.
    fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
        self.cipher
            .encrypt_block(GenericArray::from_mut_slice(&mut block[..]));
    }
}

/// Writes the RFC 3610 §2.2 length prefix for `len` octets of associated
/// data into the front of `block` and returns the prefix width.
fn encode_adata_length(block: &mut [u8; BLOCK_SIZE], len: u64) -> usize {
    if len <= 0xFEFF {
        block[..2].copy_from_slice(&(len as u16).to_be_bytes());
        2
    } else if len < 1 << 32 {
        block[0] = 0xFF;
        block[1] = 0xFE;
        block[2..6].copy_from_slice(&(len as u32).to_be_bytes());
        6
    } else {
        block[0] = 0xFF;
        block[1] = 0xFF;
        block[2..10].copy_from_slice(&len.to_be_bytes());
        10
    }
}

/// Component-wise XOR of `src` into `dst`, over `min(dst, src)` octets.
fn xor_bytes(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// Treats the whole block as one big-endian integer and adds 1. Within the
/// lengths admitted by `max_length()` the carry never reaches the nonce
/// field.
fn increment_be(counter: &mut [u8; BLOCK_SIZE]) {
    for b in counter.iter_mut().rev() {
        *b = b.wrapping_add(1);
        if *b != 0 {
            break;
        }
    }
}
